use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use derive_more::From;
use tokio::task;
use tracing::error;

use super::{error_response, SharedAppState};
use crate::{
    api,
    auth::{self, AuthClaims},
    db::{self, Users as _},
};

pub(super) async fn register(
    State(state): State<SharedAppState>,
    Json(api::user::Registration {
        name,
        login,
        password,
    }): Json<api::user::Registration>,
) -> Result<(StatusCode, Json<api::user::Token>), AuthError> {
    use AuthError as E;

    let name = name.trim().to_owned();
    let login = login.trim().to_owned();
    if name.is_empty() || login.is_empty() || password.is_empty() {
        return Err(E::MissingField);
    }

    let password_hash =
        task::spawn_blocking(move || db::user::PasswordHash::new(&password))
            .await
            .map_err(|_| E::PasswordNotHashed)?
            .map_err(|_| E::PasswordNotHashed)?;

    let user = db::User {
        id: db::user::Id::new(),
        password_hash,
        name,
        login,
    };
    state.coordinator.store().create_user(&user).await?;

    let token = state
        .verifier
        .issue(user.id)
        .map_err(|_| E::TokenNotIssued)?;
    Ok((
        StatusCode::CREATED,
        Json(api::user::Token {
            token,
            user: user.into(),
        }),
    ))
}

pub(super) async fn login(
    State(state): State<SharedAppState>,
    Json(api::user::Credentials { login, password }): Json<
        api::user::Credentials,
    >,
) -> Result<Json<api::user::Token>, AuthError> {
    use AuthError as E;

    let user = state
        .coordinator
        .store()
        .get_user_by_login(login.trim())
        .await?
        .ok_or(E::WrongLoginOrPassword)?;

    let password_hash = user.password_hash.clone();
    let verified =
        task::spawn_blocking(move || password_hash.verify(&password))
            .await
            .map_err(|_| E::PasswordNotHashed)?;
    if !verified {
        return Err(E::WrongLoginOrPassword);
    }

    let token = state
        .verifier
        .issue(user.id)
        .map_err(|_| E::TokenNotIssued)?;
    Ok(Json(api::user::Token {
        token,
        user: user.into(),
    }))
}

pub(super) async fn get_user(
    State(state): State<SharedAppState>,
    auth_claims: AuthClaims,
) -> Result<Json<api::User>, AuthError> {
    use AuthError as E;

    let my = state
        .coordinator
        .store()
        .get_user_by_id(auth_claims.user_id)
        .await?
        .ok_or(E::UserNotFound)?;

    Ok(Json(my.into()))
}

#[derive(Debug, From)]
pub enum AuthError {
    #[from]
    Credential(auth::Error),
    #[from]
    DbError(db::Error),
    MissingField,
    PasswordNotHashed,
    TokenNotIssued,
    UserNotFound,
    WrongLoginOrPassword,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            Self::Credential(auth::Error::Unauthenticated) => error_response(
                StatusCode::UNAUTHORIZED,
                "access denied, no token provided",
            ),
            Self::Credential(auth::Error::InvalidCredential) => {
                error_response(StatusCode::BAD_REQUEST, "invalid token")
            }
            Self::DbError(db::Error::LoginTaken) => {
                error_response(StatusCode::CONFLICT, db::Error::LoginTaken)
            }
            Self::MissingField => error_response(
                StatusCode::BAD_REQUEST,
                "name, login and password are required",
            ),
            Self::UserNotFound => {
                error_response(StatusCode::NOT_FOUND, "user not found")
            }
            Self::WrongLoginOrPassword => error_response(
                StatusCode::UNAUTHORIZED,
                "wrong login or password",
            ),
            Self::DbError(e) => {
                error!("storage failure: {e}");
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error",
                )
            }
            Self::PasswordNotHashed | Self::TokenNotIssued => {
                error_response(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error",
                )
            }
        }
    }
}
