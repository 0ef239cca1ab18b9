use colored::Colorize;

#[derive(Debug)]
pub struct UxError {
    pub what: String,
    pub why: Option<String>,
    pub how_to_fix: Vec<String>,
    pub suggested_command: Option<String>,
}

impl UxError {
    pub fn new(what: impl Into<String>) -> Self {
        Self {
            what: what.into(),
            why: None,
            how_to_fix: Vec::new(),
            suggested_command: None,
        }
    }

    pub fn why(mut self, reason: impl Into<String>) -> Self {
        self.why = Some(reason.into());
        self
    }

    pub fn fix(mut self, suggestion: impl Into<String>) -> Self {
        self.how_to_fix.push(suggestion.into());
        self
    }

    pub fn suggest(mut self, cmd: impl Into<String>) -> Self {
        self.suggested_command = Some(cmd.into());
        self
    }

    pub fn display(&self) {
        eprintln!();
        eprintln!("{} {}", "error:".red().bold(), self.what.white().bold());

        if let Some(why) = &self.why {
            eprintln!("       {}", why.dimmed());
        }

        if !self.how_to_fix.is_empty() {
            eprintln!();
            eprintln!("{}", "How to fix:".yellow().bold());
            for (i, fix) in self.how_to_fix.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, fix);
            }
        }

        if let Some(cmd) = &self.suggested_command {
            eprintln!();
            eprintln!("{}", "Try this:".green().bold());
            eprintln!("  $ {}", cmd.cyan());
        }
        eprintln!();
    }
}

impl std::fmt::Display for UxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.what)
    }
}

impl std::error::Error for UxError {}

pub fn config_not_found(path: &str) -> UxError {
    UxError::new(format!("Site configuration not found at '{}'", path))
        .why("kbsync reads a JSON document with a `_defaults` block and one block per site")
        .fix("Check the --config path")
        .fix("Create the file with at least {\"_defaults\": {}}")
}

pub fn config_malformed(path: &str) -> UxError {
    UxError::new(format!("Site configuration at '{}' is not usable", path))
        .why("The file is empty, is not valid JSON, or its top level is not an object")
        .fix("Make the top level a JSON object keyed by `_defaults` and site ids")
        .suggest(format!("kbsync validate --config {} --site <site>", path))
}

pub fn invalid_config(site: &str, errors: &[String]) -> UxError {
    let mut err = UxError::new(format!("Configuration for site '{}' is invalid", site))
        .why(format!("{} validation error(s)", errors.len()));
    for e in errors {
        err = err.fix(e.clone());
    }
    err
}

pub fn missing_credentials(variable: &str) -> UxError {
    UxError::new(format!("Missing environment variable: {}", variable))
        .why("Knowledge base credentials are read from the environment")
        .fix("Export KBSYNC_CLIENT_ID and KBSYNC_CLIENT_SECRET")
        .fix("Set KBSYNC_LOGIN_URL when not using the default login host")
        .suggest("kbsync run --dry-run --config <file> --site <site> --source <file>")
}

pub fn authentication_failed(reason: &str) -> UxError {
    UxError::new("Could not authenticate with the knowledge base")
        .why(reason.to_string())
        .fix("Verify the client id and secret")
        .fix("Check that the connected app allows the client-credentials flow")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ux_error_builder() {
        let err = UxError::new("Something failed")
            .why("Because of reasons")
            .fix("Try this")
            .fix("Or this")
            .suggest("kbsync validate");

        assert_eq!(err.what, "Something failed");
        assert_eq!(err.why, Some("Because of reasons".to_string()));
        assert_eq!(err.how_to_fix.len(), 2);
        assert_eq!(err.suggested_command, Some("kbsync validate".to_string()));
    }

    #[test]
    fn test_invalid_config_lists_every_error() {
        let err = invalid_config(
            "RefArch",
            &["batchSize must be between 1 and 500".to_string(), "exportMode must be delta or full".to_string()],
        );
        assert!(err.what.contains("RefArch"));
        assert_eq!(err.how_to_fix.len(), 2);
    }

    #[test]
    fn test_missing_credentials_names_variable() {
        let err = missing_credentials("KBSYNC_CLIENT_ID");
        assert!(err.to_string().contains("KBSYNC_CLIENT_ID"));
        assert!(err.suggested_command.unwrap().contains("--dry-run"));
    }

    #[test]
    fn test_display_does_not_panic() {
        authentication_failed("invalid_client").display();
        config_not_found("sites.json").display();
        config_malformed("sites.json").display();
    }
}
