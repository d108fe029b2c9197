// Word-level diff markup for modified clauses

use similar::{ChangeTag, TextDiff};

/// Render `old` -> `new` as HTML: removed words in `<del>`, inserted words
/// in `<strong>`. Adjacent changes of the same kind are merged into one tag.
pub fn diff_markup(old: &str, new: &str) -> String {
    let diff = TextDiff::from_words(old, new);
    let mut out = String::with_capacity(old.len() + new.len());
    let mut run_tag = ChangeTag::Equal;
    let mut run = String::new();

    for change in diff.iter_all_changes() {
        if change.tag() != run_tag {
            flush_run(&mut out, run_tag, &run);
            run.clear();
            run_tag = change.tag();
        }
        run.push_str(change.value());
    }
    flush_run(&mut out, run_tag, &run);

    out
}

fn flush_run(out: &mut String, tag: ChangeTag, run: &str) {
    if run.is_empty() {
        return;
    }
    let escaped = escape_html(run);
    match tag {
        ChangeTag::Equal => out.push_str(&escaped),
        ChangeTag::Delete => {
            out.push_str("<del>");
            out.push_str(&escaped);
            out.push_str("</del>");
        }
        ChangeTag::Insert => {
            out.push_str("<strong>");
            out.push_str(&escaped);
            out.push_str("</strong>");
        }
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_text_has_no_tags() {
        assert_eq!(diff_markup("Ce prix est ferme.", "Ce prix est ferme."), "Ce prix est ferme.");
    }

    #[test]
    fn test_replaced_amount() {
        let html = diff_markup("Le prix est 250.000 euros.", "Le prix est 255.000 euros.");
        assert_eq!(html, "Le prix est <del>250.000</del><strong>255.000</strong> euros.");
    }

    #[test]
    fn test_appended_words_merge_into_one_tag() {
        let html = diff_markup("Ce prix est ferme.", "Ce prix est ferme et non révisable.");
        assert!(html.starts_with("Ce prix est "));
        assert_eq!(html.matches("<strong>").count(), 1);
        assert!(html.contains("révisable."));
    }

    #[test]
    fn test_escapes_markup() {
        let html = diff_markup("a < b", "a > b");
        assert!(html.contains("&lt;"));
        assert!(html.contains("&gt;"));
        assert!(!html.contains("< b"));
    }
}
