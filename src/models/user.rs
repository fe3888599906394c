use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Buyer,
    Seller,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Buyer => "buyer",
            Role::Seller => "seller",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "buyer" => Some(Role::Buyer),
            "seller" => Some(Role::Seller),
            _ => None,
        }
    }
}

/// A user as read from the identity provider's records. Read only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub role: Role,
    pub university: String,
}

impl UserProfile {
    pub fn is_seller(&self) -> bool {
        self.role == Role::Seller
    }

    pub fn summary(&self) -> SellerSummary {
        SellerSummary {
            id: self.id,
            name: self.name.clone(),
            university: self.university.clone(),
        }
    }

    pub fn contact(&self) -> SellerContact {
        SellerContact {
            id: self.id,
            name: self.name.clone(),
            university: self.university.clone(),
            phone: self.phone.clone(),
        }
    }
}

/// Seller fields safe for public listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerSummary {
    pub id: Uuid,
    pub name: String,
    pub university: String,
}

/// Seller fields shown on an item's detail page so buyers can get in touch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellerContact {
    pub id: Uuid,
    pub name: String,
    pub university: String,
    pub phone: Option<String>,
}
