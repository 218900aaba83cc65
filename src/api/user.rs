use serde::{Deserialize, Serialize};

use crate::db;

pub use crate::db::user::Id;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub login: String,
}

impl From<db::User> for User {
    fn from(user: db::User) -> Self {
        Self {
            id: user.id,
            name: user.name,
            login: user.login,
        }
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Credentials {
    pub login: String,
    pub password: String,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Registration {
    pub name: String,
    pub login: String,
    pub password: String,
}

/// Answer to a successful registration or login.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Token {
    pub token: String,
    pub user: User,
}
