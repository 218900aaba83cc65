use std::error::Error as StdError;

use argon2::{
    password_hash::{
        self, PasswordHash as Phc, PasswordHasher as _,
        PasswordVerifier as _, SaltString,
    },
    Argon2,
};
use async_trait::async_trait;
use derive_more::Display;
use serde::{Deserialize, Serialize};
use tokio_postgres::{
    error::SqlState,
    types::{
        accepts, private::BytesMut, to_sql_checked, FromSql, IsNull, ToSql,
        Type,
    },
};
use uuid::Uuid;

use super::{Client, Error, Users};

#[derive(Clone, Debug)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub login: String,
    pub password_hash: PasswordHash,
}

#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    Hash,
    Ord,
    PartialEq,
    PartialOrd,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

impl FromSql<'_> for Id {
    accepts!(UUID);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        Uuid::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for Id {
    accepts!(UUID);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

/// Argon2id hash of a password in PHC string format, salt included.
///
/// Hashing is CPU bound, async callers run it on the blocking pool.
#[derive(Clone, Debug, PartialEq)]
pub struct PasswordHash(String);

impl PasswordHash {
    /// Hashes `secret` under a fresh random salt.
    pub fn new(secret: &str) -> Result<Self, password_hash::Error> {
        let salt = SaltString::encode_b64(&rand::random::<[u8; 16]>())?;
        let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
        Ok(Self(hash.to_string()))
    }

    pub fn verify(&self, secret: &str) -> bool {
        Phc::new(&self.0)
            .and_then(|hash| {
                Argon2::default().verify_password(secret.as_bytes(), &hash)
            })
            .is_ok()
    }
}

impl FromSql<'_> for PasswordHash {
    accepts!(TEXT);

    fn from_sql(
        ty: &Type,
        raw: &[u8],
    ) -> Result<Self, Box<dyn StdError + Sync + Send>> {
        String::from_sql(ty, raw).map(Self)
    }
}

impl ToSql for PasswordHash {
    accepts!(TEXT);

    to_sql_checked!();

    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn StdError + Sync + Send>> {
        self.0.to_sql(ty, out)
    }
}

#[async_trait]
impl Users for Client {
    async fn create_user(&self, user: &User) -> Result<(), Error> {
        const SQL: &str = "\
            INSERT INTO users (id, name, login, password_hash) \
            VALUES ($1, $2, $3, $4)";

        match self
            .0
            .execute(
                SQL,
                &[&user.id, &user.name, &user.login, &user.password_hash],
            )
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.code() == Some(&SqlState::UNIQUE_VIOLATION) => {
                Err(Error::LoginTaken)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get_user_by_login(
        &self,
        login: &str,
    ) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash \
                           FROM users \
                           WHERE login = $1 \
                           LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&login]).await?.map(|row| User {
            id: row.get("id"),
            name: row.get("name"),
            login: row.get("login"),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn get_user_by_id(&self, id: Id) -> Result<Option<User>, Error> {
        const SQL: &str = "SELECT id, name, login, password_hash \
                           FROM users \
                           WHERE id = $1 \
                           LIMIT 1";
        Ok(self.0.query_opt(SQL, &[&id]).await?.map(|row| User {
            id: row.get("id"),
            name: row.get("name"),
            login: row.get("login"),
            password_hash: row.get("password_hash"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verifies_only_the_hashed_password() {
        let hash = PasswordHash::new("password").unwrap();

        assert!(hash.verify("password"));
        assert!(!hash.verify("Password"));
        assert!(!hash.verify(""));
    }

    #[test]
    fn salts_every_hash() {
        let first = PasswordHash::new("password").unwrap();
        let second = PasswordHash::new("password").unwrap();

        assert_ne!(first, second);
        assert!(first.0.starts_with("$argon2id$"));
        assert!(second.verify("password"));
    }

    #[test]
    fn garbage_hash_verifies_nothing() {
        let hash = PasswordHash("not a phc string".into());
        assert!(!hash.verify("not a phc string"));
    }
}
