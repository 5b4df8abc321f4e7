use once_cell::sync::Lazy;
use syntect::parsing::{SyntaxReference, SyntaxSet};

/// Language name used when nothing better can be determined.
pub const PLAIN_TEXT: &str = "plain text";

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);

// Languages the destination accepts for code blocks.
const SUPPORTED: &[&str] = &[
    "abap",
    "arduino",
    "bash",
    "basic",
    "c",
    "c#",
    "c++",
    "clojure",
    "coffeescript",
    "css",
    "dart",
    "diff",
    "docker",
    "elixir",
    "elm",
    "erlang",
    "f#",
    "fortran",
    "gherkin",
    "glsl",
    "go",
    "graphql",
    "groovy",
    "haskell",
    "html",
    "java",
    "javascript",
    "json",
    "julia",
    "kotlin",
    "latex",
    "less",
    "lisp",
    "lua",
    "makefile",
    "markdown",
    "markup",
    "matlab",
    "mermaid",
    "nix",
    "objective-c",
    "ocaml",
    "pascal",
    "perl",
    "php",
    "plain text",
    "powershell",
    "prolog",
    "protobuf",
    "python",
    "r",
    "ruby",
    "rust",
    "sass",
    "scala",
    "scheme",
    "scss",
    "shell",
    "sql",
    "swift",
    "typescript",
    "vb.net",
    "verilog",
    "vhdl",
    "visual basic",
    "webassembly",
    "xml",
    "yaml",
];

/// Picks a destination code-block language for `text`.
///
/// `hint` is usually the `class` attribute of a `<code>` element
/// (`language-rust`, `lang-py`, or a bare token). When no hint resolves,
/// the first line of the code is used (shebangs, `<?php`, XML prologs).
pub fn detect_language(hint: Option<&str>, text: &str) -> &'static str {
    if let Some(lang) = hint.and_then(language_from_hint) {
        return lang;
    }
    let first_line = text.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    SYNTAXES
        .find_syntax_by_first_line(first_line)
        .and_then(supported_name)
        .unwrap_or(PLAIN_TEXT)
}

fn language_from_hint(hint: &str) -> Option<&'static str> {
    hint.split_whitespace().find_map(|class| {
        let token = class
            .strip_prefix("language-")
            .or_else(|| class.strip_prefix("lang-"))
            .unwrap_or(class)
            .to_ascii_lowercase();
        if token.is_empty() {
            return None;
        }
        if let Some(direct) = canonical(&token) {
            return Some(direct);
        }
        SYNTAXES
            .find_syntax_by_token(&token)
            .and_then(supported_name)
    })
}

fn supported_name(syntax: &SyntaxReference) -> Option<&'static str> {
    let name = syntax.name.to_ascii_lowercase();
    if name == "plain text" {
        return None;
    }
    canonical(&name).or_else(|| {
        syntax
            .file_extensions
            .iter()
            .find_map(|ext| canonical(&ext.to_ascii_lowercase()))
    })
}

fn canonical(token: &str) -> Option<&'static str> {
    let aliased = match token {
        "sh" | "zsh" | "bourne again shell (bash)" | "shell-unix-generic" => "bash",
        "js" | "jsx" | "mjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "py" | "py3" | "python3" => "python",
        "rs" => "rust",
        "rb" => "ruby",
        "cpp" | "cc" | "cxx" | "hpp" => "c++",
        "cs" | "csharp" => "c#",
        "h" => "c",
        "golang" => "go",
        "yml" => "yaml",
        "md" => "markdown",
        "tex" => "latex",
        "ps1" | "pwsh" => "powershell",
        "dockerfile" => "docker",
        "objc" | "objective-c++" => "objective-c",
        "hs" => "haskell",
        "kt" => "kotlin",
        "ml" => "ocaml",
        "pl" => "perl",
        "batch file" | "bat" | "cmd" => "shell",
        "htm" | "xhtml" => "html",
        "text" | "txt" | "plain" => PLAIN_TEXT,
        other => other,
    };
    SUPPORTED.iter().copied().find(|lang| *lang == aliased)
}
