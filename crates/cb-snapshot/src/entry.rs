use cb_types::ObjectId;
use serde::{Deserialize, Serialize};

/// One row of a snapshot's `files.index.jsonl`.
///
/// Entries are written in canonical order `(path_key ASC, insertion order
/// ASC)`. `mtime` is deliberately absent: identical input bytes must always
/// reproduce a byte-identical index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub schema_version: u32,
    /// Canonicalized path, original casing preserved.
    pub path: String,
    /// NFC lowercase form; the sort and shard key.
    pub path_key: String,
    /// CAS id of the file's bytes.
    pub object: ObjectId,
    /// Size of the file in bytes.
    pub size: u64,
    /// Language guess from the file extension, when recognized.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lang_hint: Option<String>,
    /// Unix permission bits, when the platform reports them.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<u32>,
}

/// Language hint from a file extension, when recognized.
pub fn detect_lang_hint(path: &str) -> Option<&'static str> {
    let ext = path.rsplit_once('.').map(|(_, e)| e)?;
    let hint = match ext.to_ascii_lowercase().as_str() {
        "py" => "python",
        "js" | "jsx" => "javascript",
        "ts" | "tsx" => "typescript",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "cc" | "hpp" => "cpp",
        "cs" => "csharp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "sh" | "bash" | "zsh" => "shell",
        "sql" => "sql",
        "md" => "markdown",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "xml" => "xml",
        "html" => "html",
        "css" => "css",
        _ => return None,
    };
    Some(hint)
}
