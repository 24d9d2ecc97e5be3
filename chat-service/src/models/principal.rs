use serde::{Deserialize, Serialize};

/// The verified caller of a request, decoded from its bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub email: String,
    pub name: String,
}
