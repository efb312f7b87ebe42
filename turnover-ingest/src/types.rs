use serde::Deserialize;

/// Booking ids arrive as strings from some feeds and numbers from others.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    pub fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

/// Every reservation shape the adapter accepts. `normalize` turns each
/// into one canonical `turnover_core::Booking`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawReservation {
    /// Front-end / canonical camelCase shape.
    Camel(CamelReservation),
    /// Aggregator and CSV snake_case shape.
    Snake(SnakeReservation),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CamelReservation {
    #[serde(default)]
    pub id: Option<RawId>,
    pub check_in: String,
    #[serde(default)]
    pub check_out: Option<String>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub cleaning_required: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct SnakeReservation {
    #[serde(default)]
    pub id: Option<RawId>,
    #[serde(default)]
    pub reservation_code: Option<String>,
    #[serde(default)]
    pub check_in: Option<String>,
    #[serde(default)]
    pub check_in_date: Option<String>,
    #[serde(default)]
    pub check_out: Option<String>,
    #[serde(default)]
    pub check_out_date: Option<String>,
    #[serde(default)]
    pub guest_name: Option<String>,
    #[serde(default)]
    pub cleaning_required: Option<bool>,
    #[serde(default)]
    pub status: Option<String>,
}
