use log::error;

use crate::error::{code, DbError, DbResult};
use crate::interface::DbInterface;

/// Integer aliases accepted next to the backend names.
pub const DB_PGSQL: i32 = 1;
pub const DB_ODBC: i32 = 2;
pub const DB_MYSQL: i32 = 3;
pub const DB_ORACLE: i32 = 4;
pub const DB_SQLITE: i32 = 5;

fn normalize(kind: &str) -> &str {
    match kind.trim().to_lowercase().as_str() {
        "pgsql" | "postgres" | "postgresql" | "1" => "pgsql",
        "odbc" | "2" => "odbc",
        "mysql" | "3" => "mysql",
        "oracle" | "4" => "oracle",
        "sqlite" | "5" => "sqlite",
        _ => "",
    }
}

/// Hand out a fresh driver for the named backend. The registry is static:
/// a backend compiled out of this build (or not implemented) logs at ERROR
/// level and yields no instance. Release is simply dropping the box.
pub fn get_interface(kind: &str) -> DbResult<Box<dyn DbInterface>> {
    match normalize(kind) {
        "pgsql" => {
            #[cfg(feature = "pgsql")]
            {
                Ok(Box::new(crate::drivers::pgsql::PgsqlDriver::new()))
            }
            #[cfg(not(feature = "pgsql"))]
            {
                error!("backend pgsql is not built into this runtime");
                Err(DbError::with_code(
                    code::CONNECTION_FAILED,
                    "backend pgsql is not available",
                ))
            }
        }
        name @ ("odbc" | "mysql" | "oracle" | "sqlite") => {
            error!("backend {name} is not built into this runtime");
            Err(DbError::with_code(
                code::CONNECTION_FAILED,
                format!("backend {name} is not available"),
            ))
        }
        _ => {
            error!("unknown database type {kind}");
            Err(DbError::with_code(
                code::CONNECTION_FAILED,
                format!("unknown database type {kind}"),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_backend() {
        let err = get_interface("dbase").unwrap_err();
        assert_eq!(err.code, code::CONNECTION_FAILED);
        assert!(err.message.contains("unknown"));
    }

    #[test]
    fn test_unavailable_backend() {
        let err = get_interface("oracle").unwrap_err();
        assert!(err.message.contains("not available"));
    }

    #[cfg(feature = "pgsql")]
    #[test]
    fn test_pgsql_backend_by_name_and_id() {
        assert!(get_interface("pgsql").is_ok());
        assert!(get_interface("PGSQL").is_ok());
        assert!(get_interface("1").is_ok());
    }
}
