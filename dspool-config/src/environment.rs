use std::fmt;
use std::io::{Error, ErrorKind};

/// Name of the environment variable which selects the runtime environment.
const APP_ENVIRONMENT_ENV_NAME: &str = "APP_ENVIRONMENT";

const DEV_ENV_NAME: &str = "dev";
const PROD_ENV_NAME: &str = "prod";

/// Runtime environment used to pick the settings overlay file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Development environment. The default when `APP_ENVIRONMENT` is unset.
    Dev,
    /// Production environment.
    Prod,
}

impl Environment {
    /// Loads the environment from the `APP_ENVIRONMENT` env variable,
    /// defaulting to [`Environment::Dev`] when it is not set.
    pub fn load() -> Result<Environment, Error> {
        std::env::var(APP_ENVIRONMENT_ENV_NAME)
            .unwrap_or_else(|_| DEV_ENV_NAME.into())
            .try_into()
    }

    /// Returns the string name of the environment.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Dev => DEV_ENV_NAME,
            Environment::Prod => PROD_ENV_NAME,
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for Environment {
    type Error = Error;

    /// Parses "dev" or "prod", case-insensitively.
    fn try_from(s: String) -> Result<Self, Self::Error> {
        match s.to_lowercase().as_str() {
            DEV_ENV_NAME => Ok(Self::Dev),
            PROD_ENV_NAME => Ok(Self::Prod),
            other => Err(Error::new(
                ErrorKind::InvalidInput,
                format!(
                    "`{other}` is not a supported environment; use `{DEV_ENV_NAME}` or `{PROD_ENV_NAME}`"
                ),
            )),
        }
    }
}
