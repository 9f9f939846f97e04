use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd};

/// Collects the contents of every fenced `css` code block in `text`, in
/// source order, joined by newlines. The language tag is matched
/// case-insensitively and may carry extra info after it (```` ```css title ````).
pub fn extract(text: &str) -> String {
    let parser = Parser::new_ext(text, Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    let mut blocks = Vec::new();
    let mut current: Option<String> = None;

    for event in parser {
        match event {
            Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if is_css(&info) => {
                current = Some(String::new());
            }
            Event::Text(chunk) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&chunk);
                }
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(mut block) = current.take() {
                    if block.ends_with('\n') {
                        block.pop();
                    }
                    blocks.push(block);
                }
            }
            _ => {}
        }
    }
    blocks.join("\n")
}

fn is_css(info: &str) -> bool {
    info.split_whitespace()
        .next()
        .is_some_and(|lang| lang.eq_ignore_ascii_case("css"))
}
