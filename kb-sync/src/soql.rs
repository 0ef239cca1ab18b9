//! Query strings sent to the knowledge base query endpoint.

pub const VERSION_FIELDS: &str = "Id, KnowledgeArticleId, PublishStatus, VersionNumber";

/// Escapes a value for use inside a single-quoted query literal.
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other)
        }
    }
    escaped
}

/// Newest version of the article carrying `external_id`, optionally limited
/// to one publish status.
pub fn version_lookup(
    article_type: &str,
    external_id_field: &str,
    external_id: &str,
    status: Option<&str>
) -> String {
    let mut soql = format!(
        "SELECT {VERSION_FIELDS}, {external_id_field} FROM {article_type} WHERE {external_id_field} = '{}'",
        escape_literal(external_id)
    );
    if let Some(status) = status {
        soql.push_str(&format!(" AND PublishStatus = '{}'", escape_literal(status)));
    }
    soql.push_str(" ORDER BY VersionNumber DESC LIMIT 1");
    soql
}

/// Master id of a freshly created version.
pub fn master_id_lookup(article_type: &str, version_id: &str) -> String {
    format!(
        "SELECT Id, KnowledgeArticleId FROM {article_type} WHERE Id = '{}' LIMIT 1",
        escape_literal(version_id)
    )
}

pub fn record_type_lookup(article_type: &str, developer_name: &str) -> String {
    format!(
        "SELECT Id FROM RecordType WHERE SobjectType = '{}' AND DeveloperName = '{}' LIMIT 1",
        escape_literal(article_type),
        escape_literal(developer_name)
    )
}
