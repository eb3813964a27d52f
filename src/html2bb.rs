//! Rendered-HTML to bracketed-tag markup conversion.
//!
//! Walks the fragment DOM and emits the intermediate `[tag]...[/tag]` dialect
//! the destination board stores. Elements without a mapping pass their
//! children through untouched, so unexpected wrapper markup degrades to plain
//! text instead of being dropped.

use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Convert a rendered HTML fragment into bracketed-tag markup.
pub fn html_to_bbcode(fragment: &str) -> String {
    let doc = Html::parse_fragment(fragment);
    let mut out = String::new();
    for child in doc.tree.root().children() {
        walk(child, &mut out);
    }
    out.trim().to_string()
}

fn walk(node: NodeRef<Node>, out: &mut String) {
    match node.value() {
        Node::Text(text) => out.push_str(&text[..]),
        Node::Element(el) => {
            let name = el.name();
            match name {
                "b" | "strong" => wrap(node, "b", out),
                "i" | "em" => wrap(node, "i", out),
                "u" => wrap(node, "u", out),
                "s" | "del" | "strike" => wrap(node, "s", out),
                "code" | "pre" => {
                    out.push_str("[code]");
                    out.push_str(&text_of(node));
                    out.push_str("[/code]");
                }
                "blockquote" => quote(node, out),
                "a" => {
                    if let Some(href) = el.attr("href") {
                        out.push_str(&format!("[url={}]", href));
                        children(node, out);
                        out.push_str("[/url]");
                    } else {
                        children(node, out);
                    }
                }
                "img" => {
                    if let Some(src) = el.attr("src") {
                        out.push_str(&format!("[img]{}[/img]", src));
                    }
                }
                "span" => span(node, el.attr("style"), out),
                "ul" => list(node, None, out),
                "ol" => list(node, Some("1"), out),
                "li" => {
                    out.push_str("[*]");
                    children(node, out);
                    out.push('\n');
                }
                "center" => wrap(node, "center", out),
                "div" => {
                    let centered = el
                        .attr("align")
                        .map(|a| a.eq_ignore_ascii_case("center"))
                        .unwrap_or(false);
                    if centered {
                        wrap(node, "center", out);
                    } else {
                        children(node, out);
                    }
                }
                "br" => out.push('\n'),
                "p" => {
                    children(node, out);
                    out.push('\n');
                }
                // Unknown wrappers contribute only their children
                _ => children(node, out),
            }
        }
        _ => {}
    }
}

fn children(node: NodeRef<Node>, out: &mut String) {
    for child in node.children() {
        walk(child, out);
    }
}

fn wrap(node: NodeRef<Node>, tag: &str, out: &mut String) {
    out.push_str(&format!("[{}]", tag));
    children(node, out);
    out.push_str(&format!("[/{}]", tag));
}

/// Quote blocks carry an optional author in a leading `cite` element
/// ("Name wrote:"), which becomes the tag parameter instead of body text.
fn quote(node: NodeRef<Node>, out: &mut String) {
    let cite = node
        .children()
        .flat_map(|c| descendant_cite(c))
        .next();
    match cite {
        Some(author) => out.push_str(&format!("[quote={}]", author)),
        None => out.push_str("[quote]"),
    }
    for child in node.children() {
        if descendant_cite(child).is_some() {
            // The cite element itself was folded into the parameter; emit the
            // rest of this subtree without it.
            for inner in child.children() {
                if !is_cite(inner) {
                    walk(inner, out);
                }
            }
        } else {
            walk(child, out);
        }
    }
    out.push_str("[/quote]");
}

fn is_cite(node: NodeRef<Node>) -> bool {
    node.value()
        .as_element()
        .map(|e| e.name() == "cite")
        .unwrap_or(false)
}

fn descendant_cite(node: NodeRef<Node>) -> Option<String> {
    if is_cite(node) {
        return Some(clean_author(&text_of(node)));
    }
    node.children().flat_map(descendant_cite).next()
}

fn clean_author(raw: &str) -> String {
    raw.trim().trim_end_matches("wrote:").trim().to_string()
}

/// Inline style spans map to color/size/font tags; anything else passes
/// through.
fn span(node: NodeRef<Node>, style: Option<&str>, out: &mut String) {
    let style = style.unwrap_or("");
    if let Some(color) = style_value(style, "color") {
        out.push_str(&format!("[color={}]", color));
        children(node, out);
        out.push_str("[/color]");
    } else if let Some(size) = style_value(style, "font-size") {
        let size = size.trim_end_matches("px").trim_end_matches('%').trim();
        out.push_str(&format!("[size={}]", size));
        children(node, out);
        out.push_str("[/size]");
    } else if let Some(font) = style_value(style, "font-family") {
        out.push_str(&format!("[font={}]", font));
        children(node, out);
        out.push_str("[/font]");
    } else {
        children(node, out);
    }
}

fn style_value(style: &str, property: &str) -> Option<String> {
    style.split(';').find_map(|decl| {
        let (key, value) = decl.split_once(':')?;
        if key.trim().eq_ignore_ascii_case(property) {
            Some(value.trim().to_string())
        } else {
            None
        }
    })
}

fn list(node: NodeRef<Node>, ordered: Option<&str>, out: &mut String) {
    match ordered {
        Some(kind) => out.push_str(&format!("[list={}]", kind)),
        None => out.push_str("[list]"),
    }
    out.push('\n');
    children(node, out);
    out.push_str("[/list]");
}

fn text_of(node: NodeRef<Node>) -> String {
    if let Some(el) = ElementRef::wrap(node) {
        el.text().collect::<String>()
    } else {
        node.value()
            .as_text()
            .map(|t| t.to_string())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bold_and_italic() {
        assert_eq!(
            html_to_bbcode("<strong>hi</strong> and <em>there</em>"),
            "[b]hi[/b] and [i]there[/i]"
        );
    }

    #[test]
    fn nested_inline_tags() {
        assert_eq!(
            html_to_bbcode("<b><i>both</i></b>"),
            "[b][i]both[/i][/b]"
        );
    }

    #[test]
    fn links_keep_href_as_parameter() {
        assert_eq!(
            html_to_bbcode(r#"<a href="https://example.com">site</a>"#),
            "[url=https://example.com]site[/url]"
        );
    }

    #[test]
    fn images_use_src() {
        assert_eq!(
            html_to_bbcode(r#"<img src="https://example.com/a.png">"#),
            "[img]https://example.com/a.png[/img]"
        );
    }

    #[test]
    fn quote_with_cited_author() {
        let html = "<blockquote><div><cite>alice wrote:</cite>words</div></blockquote>";
        assert_eq!(html_to_bbcode(html), "[quote=alice]words[/quote]");
    }

    #[test]
    fn quote_without_author() {
        assert_eq!(
            html_to_bbcode("<blockquote>words</blockquote>"),
            "[quote]words[/quote]"
        );
    }

    #[test]
    fn color_span() {
        assert_eq!(
            html_to_bbcode(r#"<span style="color:#FF0000">red</span>"#),
            "[color=#FF0000]red[/color]"
        );
    }

    #[test]
    fn unordered_list_items() {
        let html = "<ul><li>one</li><li>two</li></ul>";
        assert_eq!(html_to_bbcode(html), "[list]\n[*]one\n[*]two\n[/list]");
    }

    #[test]
    fn code_preserves_inner_text_raw() {
        let html = "<code>let x = &amp;y;</code>";
        assert_eq!(html_to_bbcode(html), "[code]let x = &y;[/code]");
    }

    #[test]
    fn unknown_wrappers_pass_children_through() {
        assert_eq!(html_to_bbcode("<article><b>x</b></article>"), "[b]x[/b]");
    }

    #[test]
    fn plain_text_survives() {
        assert_eq!(html_to_bbcode("just text"), "just text");
    }
}
