use topcharts::normalize::{clean, decode_entities, decode_unicode_escapes};

#[test]
fn strips_tags_and_decodes_entities() {
    assert_eq!(clean("<b>A &amp; B</b>"), "A & B");
    assert_eq!(clean("Rock &quot;n&quot; Roll"), "Rock \"n\" Roll");
    assert_eq!(clean("Don&#39;t"), "Don't");
}

#[test]
fn collapses_whitespace_and_trims() {
    assert_eq!(clean("  one\n\n two\t\tthree  "), "one two three");
    assert_eq!(clean("<p>\n  Hello\n</p>"), "Hello");
}

#[test]
fn decodes_unicode_escapes() {
    assert_eq!(clean(r"Mart\u00edn"), "Martín");
    assert_eq!(decode_unicode_escapes(r"\uD83C\uDFB5 song"), "\u{1F3B5} song");
}

#[test]
fn unpaired_surrogates_are_kept_literally() {
    assert_eq!(decode_unicode_escapes(r"x\uD800y"), r"x\uD800y");
    assert_eq!(decode_unicode_escapes(r"\udc00\u0041"), r"\udc00A");
    assert_eq!(clean(r"a \ud83d b"), r"a \ud83d b");
}

#[test]
fn entities_decode_in_a_single_pass() {
    assert_eq!(decode_entities("&amp;lt;"), "&lt;");
}

#[test]
fn clean_is_idempotent() {
    let samples = [
        "<b>A &amp; B</b>",
        "&amp;lt;b&amp;gt;Nested&amp;lt;/b&amp;gt;",
        "x &lt;tag&gt; y",
        "  spaced\n\nout  ",
        "Bad <unclosed tag",
        "Quote &quot;&amp;&quot;",
        "plain",
        "",
        "Beyoncé & Jay-Z",
        r"Mart\u00edn &amp; friends",
    ];

    for sample in samples {
        let once = clean(sample);
        assert_eq!(clean(&once), once, "not idempotent for {sample:?}");
    }
}

#[test]
fn empty_and_markup_only_inputs_become_empty() {
    assert_eq!(clean(""), "");
    assert_eq!(clean("<br/><span></span>"), "");
}
