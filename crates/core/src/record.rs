//! Domain types shared across the ingestion pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// The four assignment kinds the registry publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentType {
    /// 門牌初編
    Initial,
    /// 門牌增編
    Extension,
    /// 門牌改編
    Renumbering,
    /// 門牌廢編
    Revocation,
}

impl AssignmentType {
    /// The label used on the registry site.
    pub fn label(&self) -> &'static str {
        match self {
            AssignmentType::Initial => "門牌初編",
            AssignmentType::Extension => "門牌增編",
            AssignmentType::Renumbering => "門牌改編",
            AssignmentType::Revocation => "門牌廢編",
        }
    }

    /// Stable identifier stored in database columns.
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentType::Initial => "initial",
            AssignmentType::Extension => "extension",
            AssignmentType::Renumbering => "renumbering",
            AssignmentType::Revocation => "revocation",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "門牌初編" => Some(AssignmentType::Initial),
            "門牌增編" => Some(AssignmentType::Extension),
            "門牌改編" => Some(AssignmentType::Renumbering),
            "門牌廢編" => Some(AssignmentType::Revocation),
            _ => None,
        }
    }

    pub fn from_str_id(s: &str) -> Option<Self> {
        match s {
            "initial" => Some(AssignmentType::Initial),
            "extension" => Some(AssignmentType::Extension),
            "renumbering" => Some(AssignmentType::Renumbering),
            "revocation" => Some(AssignmentType::Revocation),
            _ => None,
        }
    }
}

/// Parameters of one ingestion run, scoped to a single district.
///
/// Dates are carried in the source-native Minguo form (e.g. "114-09-01")
/// because that is what the registry's query form accepts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    pub city: String,
    pub district: String,
    pub start_date_roc: String,
    pub end_date_roc: String,
    pub assignment_type: AssignmentType,
}

/// One row as scraped from the result grid, before any parsing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAddressTuple {
    pub full_address: String,
    pub register_date: String,
    pub register_type: String,
}

/// Decomposed address fields.
///
/// All fields are optional; an address needs at least one recognized
/// marker to get here at all. The village keeps its 里/村 marker since
/// the marker is part of the proper name. Numeric fields hold clean
/// Arabic digit strings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressParts {
    pub village: Option<String>,
    pub neighborhood: Option<String>,
    pub road: Option<String>,
    pub section: Option<String>,
    pub lane: Option<String>,
    pub alley: Option<String>,
    pub number: Option<String>,
    pub floor: Option<String>,
    pub floor_dash: Option<String>,
}

/// A fully normalized record ready for persistence.
///
/// `raw_data` preserves the original scraped row verbatim for forensics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredAddressRecord {
    pub city: String,
    pub district: String,
    pub full_address: String,
    pub parts: AddressParts,
    pub assignment_type: AssignmentType,
    pub assignment_date: NaiveDate,
    pub assignment_date_roc: String,
    pub raw_data: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assignment_type_label_round_trip() {
        for t in [
            AssignmentType::Initial,
            AssignmentType::Extension,
            AssignmentType::Renumbering,
            AssignmentType::Revocation,
        ] {
            assert_eq!(AssignmentType::from_label(t.label()), Some(t));
            assert_eq!(AssignmentType::from_str_id(t.as_str()), Some(t));
        }
    }

    #[test]
    fn test_assignment_type_unknown_label() {
        assert_eq!(AssignmentType::from_label("門牌查詢"), None);
        assert_eq!(AssignmentType::from_str_id("bogus"), None);
    }

    #[test]
    fn test_address_parts_default_is_empty() {
        let parts = AddressParts::default();
        assert!(parts.village.is_none());
        assert!(parts.number.is_none());
    }
}
