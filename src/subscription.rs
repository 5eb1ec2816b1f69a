//! Subscription introspection derived from a validated purchase.
//!
//! Introductory-price metadata arrives from the store as JSON:
//! ```text
//! {"introductoryPrice": "0.99", "introductoryPriceLocale": "USD",
//!  "subscriptionNumberOfUnits": "1", "subscriptionPeriodUnit": "2"}
//! ```
//! Period units: 0 day, 1 week, 2 month, 3 year. Stores send the numbers
//! either as strings or as integers.

use crate::clock::Clock;
use crate::receipt::ValidatedPurchase;
use crate::PurchaseError;
use chrono::{DateTime, Duration, Months, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Subscription period length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionPeriod {
    /// N days.
    Days(u32),
    /// N weeks.
    Weeks(u32),
    /// N months.
    Months(u32),
    /// N years.
    Years(u32),
}

impl SubscriptionPeriod {
    fn from_store(units: u32, unit: u32) -> Option<Self> {
        match unit {
            0 => Some(Self::Days(units)),
            1 => Some(Self::Weeks(units)),
            2 => Some(Self::Months(units)),
            3 => Some(Self::Years(units)),
            _ => None,
        }
    }

    /// `start` advanced by one period.
    pub fn add_to(&self, start: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match *self {
            Self::Days(n) => start.checked_add_signed(Duration::days(n.into())),
            Self::Weeks(n) => start.checked_add_signed(Duration::weeks(n.into())),
            Self::Months(n) => start.checked_add_months(Months::new(n)),
            Self::Years(n) => start.checked_add_months(Months::new(n.checked_mul(12)?)),
        }
    }
}

/// Parsed introductory-price metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntroductoryPriceInfo {
    /// Localized introductory price.
    #[serde(default)]
    pub introductory_price: Option<String>,
    /// Currency of the introductory price.
    #[serde(default)]
    pub introductory_price_locale: Option<String>,
    /// Regular period length in units.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub subscription_number_of_units: Option<u32>,
    /// Regular period unit.
    #[serde(default, deserialize_with = "lenient_u32")]
    pub subscription_period_unit: Option<u32>,
}

impl IntroductoryPriceInfo {
    /// Parse the store's JSON.
    pub fn parse(json: &str) -> Result<Self, PurchaseError> {
        serde_json::from_str(json).map_err(|e| {
            PurchaseError::GatewayMetadata(format!("Invalid introductory price info: {}", e))
        })
    }

    /// Regular billing period, when both fields are present and known.
    pub fn period(&self) -> Option<SubscriptionPeriod> {
        SubscriptionPeriod::from_store(
            self.subscription_number_of_units?,
            self.subscription_period_unit?,
        )
    }
}

fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrString {
        Num(u32),
        Str(String),
    }

    match Option::<NumOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumOrString::Num(n)) => Ok(Some(n)),
        Some(NumOrString::Str(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Subscription state at grant time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionInfo {
    /// Purchase (or renewal) date.
    pub purchase_date: DateTime<Utc>,
    /// End of the paid period, if known.
    pub expire_date: Option<DateTime<Utc>>,
    /// Whether the subscription will renew.
    pub is_auto_renewing: bool,
    /// Whether the paid period has ended.
    pub is_expired: bool,
    /// Introductory price, if the store offered one.
    pub introductory_price: Option<String>,
}

impl SubscriptionInfo {
    /// Derive subscription state from a purchase and optional intro metadata.
    pub fn derive(
        purchase: &ValidatedPurchase,
        intro: Option<&IntroductoryPriceInfo>,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now_utc();
        let purchase_date = purchase.purchase_timestamp();

        let expire_date = purchase.expires_at().or_else(|| {
            intro
                .and_then(IntroductoryPriceInfo::period)
                .and_then(|p| p.add_to(purchase_date))
        });

        let is_expired = expire_date.is_some_and(|e| e <= now);
        let is_auto_renewing = purchase.auto_renewing().unwrap_or(!is_expired);

        Self {
            purchase_date,
            expire_date,
            is_auto_renewing,
            is_expired,
            introductory_price: intro.and_then(|i| i.introductory_price.clone()),
        }
    }
}
