use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniversityModel {
    pub name: String,
    pub abbreviation: String,
    pub location: String,
    pub region: String,
    pub is_active: bool,
}

impl UniversityModel {
    pub fn new(name: &str, abbreviation: &str, location: &str, region: &str) -> Self {
        Self {
            name: name.to_string(),
            abbreviation: abbreviation.to_string(),
            location: location.to_string(),
            region: region.to_string(),
            is_active: true,
        }
    }
}
