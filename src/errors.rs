//! Errors that can stop the service before it starts serving requests.

use diesel::result::Error as DieselError;
use diesel::ConnectionError;

error_chain! {
    foreign_links {
        Var(::std::env::VarError);
        R2D2(::r2d2::Error);
        Diesel(DieselError);
        Connection(ConnectionError);
    }

    errors {
        InvalidConfig(key: String, value: String) {
            description("invalid configuration value")
            display("invalid value for {}: {:?}", key, value)
        }
        InvalidSecret(length: usize) {
            description("invalid session secret")
            display("SESSION_SECRET must be a 256 or 512 bit key in base64 (44/88 chars) or hex (64/128 chars), got {} chars", length)
        }
        Migration(reason: String) {
            description("database migration failed")
            display("database migration failed: {}", reason)
        }
        AdminAccount(reason: String) {
            description("admin account setup failed")
            display("could not set up the admin account: {}", reason)
        }
    }
}
