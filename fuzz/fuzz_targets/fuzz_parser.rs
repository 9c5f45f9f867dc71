//! Fuzz target for the configuration parser.
//!
//! Arbitrary text must either fail with an error or produce a model that
//! renders back to text parsing to the same model. When it parses, the
//! model is also diffed against a structured candidate and the generated
//! commands are replayed.

#![no_main]

use arbitrary::Arbitrary;
use forticfg::command::{apply_commands, generate};
use forticfg::diff::Differ;
use forticfg::parser::{ParseOptions, Parser};
use forticfg::policy::ConfigPolicy;
use libfuzzer_sys::fuzz_target;

/// Either raw text or a line-structured document built from known keywords.
#[derive(Debug, Arbitrary)]
enum FuzzInput {
    Raw(String),
    Lines(Vec<FuzzLine>),
}

#[derive(Debug, Arbitrary)]
enum FuzzLine {
    Config(String),
    Edit(String),
    Set(String, Vec<String>),
    Unset(String),
    Next,
    End,
    Comment(String),
}

impl FuzzLine {
    fn render(&self) -> String {
        match self {
            FuzzLine::Config(name) => format!("config {}", name),
            FuzzLine::Edit(key) => format!("edit \"{}\"", key.replace('"', "")),
            FuzzLine::Set(name, values) => format!("set {} {}", name, values.join(" ")),
            FuzzLine::Unset(name) => format!("unset {}", name),
            FuzzLine::Next => "next".to_string(),
            FuzzLine::End => "end".to_string(),
            FuzzLine::Comment(text) => format!("#{}", text),
        }
    }
}

fuzz_target!(|input: FuzzInput| {
    let text = match input {
        FuzzInput::Raw(text) => text,
        FuzzInput::Lines(lines) => lines
            .iter()
            .map(FuzzLine::render)
            .collect::<Vec<_>>()
            .join("\n"),
    };

    let policy = ConfigPolicy::fortios();
    let lenient = Parser::new(policy.clone()).with_options(ParseOptions { lenient: true });
    let _ = lenient.parse(&text);

    let parser = Parser::new(policy.clone());
    let Ok(tree) = parser.parse(&text) else {
        return;
    };

    let rendered = tree.to_text();
    let reparsed = parser
        .parse(&rendered)
        .expect("rendered configuration must parse");
    assert_eq!(reparsed, tree);

    let candidate = parser
        .parse("config system global\n    set hostname fuzz\nend\n")
        .expect("fixed candidate parses");
    let commands = generate(&Differ::new(policy.clone()).diff(&tree, &candidate));
    let replayed = apply_commands(&tree, &commands, &policy).expect("generated commands apply");
    assert_eq!(replayed, candidate);
});
