//! Purpose: Pretty JSON for terminal output, optionally ANSI-colored.
//! Exports: `render_json`.
//! Role: Pure formatter behind `--json` output on a TTY.
//! Invariants: Without color the text equals `serde_json::to_string_pretty`.
use serde_json::{Map, Value};

const INDENT: &str = "  ";

#[derive(Clone, Copy)]
enum Tone {
    Key,
    Text,
    Number,
    Literal,
    Plain,
}

impl Tone {
    fn code(self) -> &'static str {
        match self {
            Tone::Key => "36",
            Tone::Text => "32",
            Tone::Number => "33",
            Tone::Literal => "35",
            Tone::Plain => "39",
        }
    }
}

struct Painter {
    color: bool,
    out: String,
}

pub fn render_json(value: &Value, color: bool) -> String {
    let mut painter = Painter {
        color,
        out: String::new(),
    };
    painter.value(value, 0);
    painter.out
}

impl Painter {
    fn value(&mut self, value: &Value, depth: usize) {
        match value {
            Value::Null => self.paint("null", Tone::Literal),
            Value::Bool(flag) => self.paint(if *flag { "true" } else { "false" }, Tone::Literal),
            Value::Number(number) => self.paint(&number.to_string(), Tone::Number),
            Value::String(text) => self.paint(&quote(text), Tone::Text),
            Value::Array(items) => self.array(items, depth),
            Value::Object(fields) => self.object(fields, depth),
        }
    }

    fn array(&mut self, items: &[Value], depth: usize) {
        if items.is_empty() {
            return self.paint("[]", Tone::Plain);
        }
        self.paint("[", Tone::Plain);
        for (idx, item) in items.iter().enumerate() {
            self.newline(depth + 1);
            self.value(item, depth + 1);
            if idx + 1 < items.len() {
                self.paint(",", Tone::Plain);
            }
        }
        self.newline(depth);
        self.paint("]", Tone::Plain);
    }

    fn object(&mut self, fields: &Map<String, Value>, depth: usize) {
        if fields.is_empty() {
            return self.paint("{}", Tone::Plain);
        }
        self.paint("{", Tone::Plain);
        for (idx, (key, value)) in fields.iter().enumerate() {
            self.newline(depth + 1);
            self.paint(&quote(key), Tone::Key);
            self.paint(":", Tone::Plain);
            self.out.push(' ');
            self.value(value, depth + 1);
            if idx + 1 < fields.len() {
                self.paint(",", Tone::Plain);
            }
        }
        self.newline(depth);
        self.paint("}", Tone::Plain);
    }

    fn newline(&mut self, depth: usize) {
        self.out.push('\n');
        self.out.push_str(&INDENT.repeat(depth));
    }

    fn paint(&mut self, text: &str, tone: Tone) {
        if self.color {
            self.out.push_str("\u{1b}[");
            self.out.push_str(tone.code());
            self.out.push('m');
            self.out.push_str(text);
            self.out.push_str("\u{1b}[0m");
        } else {
            self.out.push_str(text);
        }
    }
}

fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

#[cfg(test)]
mod tests {
    use super::render_json;
    use serde_json::json;

    #[test]
    fn plain_output_matches_serde_pretty() {
        let value = json!({
            "content": [{"id": 1, "nome": "Boné", "deletedAt": null}],
            "empty": false,
            "pageable": {}
        });
        let expected = serde_json::to_string_pretty(&value).expect("pretty");
        assert_eq!(render_json(&value, false), expected);
    }

    #[test]
    fn colored_output_tags_each_token_kind() {
        let value = json!({"nome": "Boné", "preco": 4500, "ativo": true});
        let colored = render_json(&value, true);
        assert!(colored.contains("\u{1b}[36m\"nome\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[32m\"Boné\"\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[33m4500\u{1b}[0m"));
        assert!(colored.contains("\u{1b}[35mtrue\u{1b}[0m"));
    }
}
