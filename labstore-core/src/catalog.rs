//! The closed set of logical collections the service persists.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::error::DbError;

macro_rules! collections {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// A logical collection.
        ///
        /// The set is closed: operations can only target one of these variants, and each
        /// variant maps to a stable wire name used as the physical collection name (after
        /// the configured prefix).
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum DbCollection {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl DbCollection {
            /// Every logical collection, in declaration order.
            pub const ALL: &'static [DbCollection] = &[$(DbCollection::$variant),+];

            /// Returns the stable wire name of this collection.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(DbCollection::$variant => $name,)+
                }
            }
        }

        impl FromStr for DbCollection {
            type Err = DbError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(DbCollection::$variant),)+
                    other => Err(DbError::Configuration(format!("Unknown collection: {other}"))),
                }
            }
        }
    };
}

collections! {
    ProductGroup => "ProductGroup",
    Product => "Product",
    Partner => "Partner",
    PartnerBranch => "PartnerBranch",
    Appointment => "Appointment",
    Customer => "Customer",
    SurveyDefinition => "SurveyDefinition",
    SurveyQuestionGroup => "SurveyQuestionGroup",
    SurveyQuestionCategory => "SurveyQuestionCategory",
    SurveyQuestion => "SurveyQuestion",
    CustomerSurvey => "CustomerSurvey",
    Order => "Order",
    SmsMessage => "SMSMessage",
    RuntimeSetting => "RuntimeSetting",
    ResultCategory => "ResultCategory",
    HealthMeasure => "HealthMeasure",
    BloodMeasure => "BloodMeasure",
    TestResult => "TestResult",
    User => "User",
}

impl DbCollection {
    /// Returns the physical collection name for the given key prefix.
    pub fn physical_name(&self, prefix: &str) -> String {
        format!("{prefix}{}", self.as_str())
    }
}

impl fmt::Display for DbCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
