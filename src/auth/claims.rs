use serde::{Deserialize, Serialize};

use crate::auth::repo_types::UserId;

/// Session token payload. Decoded strictly: a missing or non-integral
/// `user_id` fails deserialization instead of defaulting. `iat` is written on
/// issue but optional on decode, so `{user_id, exp}` tokens still verify.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub user_id: UserId, // subject
    #[serde(default)]
    pub iat: i64, // issued at (unix timestamp)
    pub exp: i64, // expires at (unix timestamp)
}
