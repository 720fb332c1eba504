use std::fmt;
use std::io::Write;
use std::str::FromStr;

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, Utc};
use diesel::deserialize::{self, FromSql, FromSqlRow};
use diesel::expression::AsExpression;
use diesel::pg::{Pg, PgValue};
use diesel::prelude::*;
use diesel::serialize::{self, IsNull, Output, ToSql};
use diesel::{insert_into, update as diesel_update};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::schema::sql_types::UserRole;
use crate::db::schema::users;
use crate::types::ApiError;
use crate::utils::serialize_date;

use super::utils::normalize_email;

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsExpression, FromSqlRow, Serialize, Deserialize)]
#[diesel(sql_type = UserRole)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct UnknownRole(String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role: {}", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Role, UnknownRole> {
        match s {
            "admin" => Ok(Role::Admin),
            "user" => Ok(Role::User),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

impl ToSql<UserRole, Pg> for Role {
    fn to_sql<'b>(&'b self, out: &mut Output<'b, '_, Pg>) -> serialize::Result {
        out.write_all(self.as_str().as_bytes())?;
        Ok(IsNull::No)
    }
}

impl FromSql<UserRole, Pg> for Role {
    fn from_sql(bytes: PgValue<'_>) -> deserialize::Result<Self> {
        Ok(std::str::from_utf8(bytes.as_bytes())?.parse()?)
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Identifiable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(Pg))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: Role,
    #[serde(serialize_with = "serialize_date")]
    pub created_at: DateTime<Utc>,
}

/// The view of an account shown in the administration listing.
#[derive(Debug, Queryable, Selectable, Serialize)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(Pg))]
pub struct UserSummary {
    pub id: Uuid,
    pub email: String,
    pub role: Role,
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub email: &'a str,
    pub password_hash: String,
    pub role: Role,
}

impl User {
    pub fn make_password(password: &str) -> Result<String, ApiError> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| ApiError::Internal(format!("failed to hash password: {}", e)))
    }

    pub fn verify_password(&self, password: &str) -> bool {
        match PasswordHash::new(&self.password_hash) {
            Ok(parsed) => Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok(),
            Err(_) => false,
        }
    }

    pub fn load_by_email(email: &str, connection: &mut PgConnection) -> QueryResult<Option<User>> {
        users::table
            .filter(users::email.eq(email))
            .select(User::as_select())
            .first(connection)
            .optional()
    }

    pub fn create(
        email: &str,
        password: &str,
        role: Role,
        connection: &mut PgConnection,
    ) -> Result<User, ApiError> {
        let new_user = NewUser {
            email,
            password_hash: User::make_password(password)?,
            role,
        };
        let user = insert_into(users::table)
            .values(&new_user)
            .returning(User::as_returning())
            .get_result(connection)?;
        Ok(user)
    }

    /// Creates the account with the admin role, or promotes it when the
    /// email is already registered. An existing password is left untouched.
    pub fn ensure_admin(
        email: &str,
        password: &str,
        connection: &mut PgConnection,
    ) -> Result<User, ApiError> {
        let email = normalize_email(email);
        match User::load_by_email(&email, connection)? {
            Some(user) if user.role == Role::Admin => Ok(user),
            Some(user) => {
                let user = diesel_update(&user)
                    .set(users::role.eq(Role::Admin))
                    .returning(User::as_returning())
                    .get_result(connection)?;
                Ok(user)
            }
            None => User::create(&email, password, Role::Admin, connection),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with_password(password: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: "reader@example.com".to_string(),
            password_hash: User::make_password(password).unwrap(),
            role: Role::User,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn password_hash_verifies_only_the_hashed_password() {
        let user = user_with_password("correct horse battery");
        assert!(user.password_hash.starts_with("$argon2"));
        assert!(user.verify_password("correct horse battery"));
        assert!(!user.verify_password("correct horse"));
    }

    #[test]
    fn malformed_hash_never_verifies() {
        let mut user = user_with_password("whatever-password");
        user.password_hash = "not-a-phc-string".to_string();
        assert!(!user.verify_password("whatever-password"));
    }

    #[test]
    fn serialized_user_hides_password_hash() {
        let user = user_with_password("secret-password");
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "user");
        assert_eq!(json["email"], "reader@example.com");
        assert!(json["createdAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn roles_parse_from_their_wire_names() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("root".parse::<Role>().is_err());
        assert_eq!(serde_json::from_str::<Role>("\"admin\"").unwrap(), Role::Admin);
    }
}
