use colored::Colorize;

pub fn header(title: &str) {
    println!("{}", title.bold().underline());
}

pub fn subheader(title: &str) {
    println!("{}", title.bold());
}

pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", format!("{label}:").dimmed(), value);
}

pub fn warn(msg: &str) {
    eprintln!("{} {}", "warning:".yellow().bold(), msg);
}

pub fn error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

pub fn failure(msg: &str) {
    println!("{} {}", "✗".red().bold(), msg);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_helpers_do_not_panic() {
        header("Run Report");
        subheader("Records");
        field("Site", "RefArch");
        warn("batchSize is large");
        error("run aborted");
        success("faq-001");
        failure("faq-002");
    }
}
