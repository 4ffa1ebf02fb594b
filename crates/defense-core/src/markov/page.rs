use crate::markov::store::MarkovStore;
use crate::markov::SENTINEL_WORD_ID;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

const DEFAULT_SENTENCES: u32 = 15;
const FAKE_LINK_COUNT: usize = 7;
const FAKE_LINK_DEPTH: u32 = 3;
const MIN_WORDS_FOR_PARAGRAPH_BREAK: usize = 5;

const FALLBACK_PAGE: &str =
    "<!doctype html><html><body><p>Service temporarily unavailable.</p></body></html>";

/// Renders a full tarpit page for `seed_input` (already the
/// `sha256(system_seed || normalized_path)` string). Walks the Markov chain
/// starting from the sentinel state, assembles paragraphs, appends fake
/// links and the hidden trap link, and returns byte-identical output for
/// byte-identical `(seed_input, store contents)` (SPEC_FULL.md §4.3).
///
/// Never raises: a store error partway through still yields the static
/// fallback, matching the original's "never raise to caller."
pub async fn generate_page(seed_input: &str, store: &dyn MarkovStore) -> String {
    let mut rng = super::seeded_rng("", seed_input);
    let body = match generate_body(&mut rng, store).await {
        Some(body) => body,
        None => return FALLBACK_PAGE.to_string(),
    };

    let links = generate_fake_links(&mut rng);
    let title = generate_title(&mut rng);
    assemble_html(&title, &body, &links)
}

async fn generate_body(rng: &mut StdRng, store: &dyn MarkovStore) -> Option<String> {
    let max_words = DEFAULT_SENTENCES * rng.gen_range(15..=30);
    let mut word_count: u32 = 0;
    let mut content = String::new();
    let mut paragraph: Vec<String> = Vec::new();
    let (mut p1, mut p2) = (SENTINEL_WORD_ID, SENTINEL_WORD_ID);
    let mut saw_any_word = false;

    while word_count < max_words {
        let candidates = store.candidates(p1, p2).await.ok()?;
        if candidates.is_empty() {
            break;
        }

        let chosen = weighted_choice(rng, &candidates);

        if chosen.next_id == SENTINEL_WORD_ID {
            flush_paragraph(&mut content, &mut paragraph, true);
            p1 = SENTINEL_WORD_ID;
            p2 = SENTINEL_WORD_ID;
            continue;
        }

        saw_any_word = true;
        let ends_sentence = chosen
            .word
            .ends_with(['.', '!', '?']);
        paragraph.push(chosen.word.clone());
        word_count += 1;
        p1 = p2;
        p2 = chosen.next_id;

        if ends_sentence && paragraph.len() > MIN_WORDS_FOR_PARAGRAPH_BREAK {
            flush_paragraph(&mut content, &mut paragraph, false);
            p1 = SENTINEL_WORD_ID;
            p2 = SENTINEL_WORD_ID;
        }
    }

    flush_paragraph(&mut content, &mut paragraph, true);

    if !saw_any_word {
        return None;
    }
    Some(content)
}

fn flush_paragraph(content: &mut String, paragraph: &mut Vec<String>, trailing_period: bool) {
    if paragraph.is_empty() {
        return;
    }
    content.push_str("<p>");
    content.push_str(&paragraph.join(" "));
    if trailing_period {
        content.push('.');
    }
    content.push_str("</p>\n");
    paragraph.clear();
}

fn weighted_choice<'a>(
    rng: &mut StdRng,
    candidates: &'a [crate::markov::MarkovCandidate],
) -> &'a crate::markov::MarkovCandidate {
    let total: i64 = candidates.iter().map(|c| c.freq.max(0)).sum();
    if total <= 0 {
        return candidates.choose(rng).expect("candidates is non-empty");
    }
    let mut pick = rng.gen_range(0..total);
    for candidate in candidates {
        let weight = candidate.freq.max(0);
        if pick < weight {
            return candidate;
        }
        pick -= weight;
    }
    candidates.last().expect("candidates is non-empty")
}

fn random_path_segment(rng: &mut StdRng, len: usize) -> String {
    const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

struct FakeLink {
    href: String,
    text: String,
}

fn generate_fake_links(rng: &mut StdRng) -> Vec<FakeLink> {
    const KINDS: &[&str] = &["page", "js", "data", "css"];
    let mut links = Vec::with_capacity(FAKE_LINK_COUNT);

    for _ in 0..FAKE_LINK_COUNT {
        let kind = KINDS[rng.gen_range(0..KINDS.len())];
        let num_dirs = rng.gen_range(0..=FAKE_LINK_DEPTH);
        let dirs: Vec<String> = (0..num_dirs)
            .map(|_| random_path_segment(rng, rng.gen_range(5..=8)))
            .collect();
        let filename = random_path_segment(rng, 10);

        let (prefix, ext) = match kind {
            "page" => ("/tarpit/page/", ".html"),
            "js" => ("/tarpit/js/", ".js"),
            "data" => (
                "/tarpit/data/",
                *[".json", ".xml", ".csv"]
                    .get(rng.gen_range(0..3))
                    .unwrap(),
            ),
            _ => ("/tarpit/styles/", ".css"),
        };

        let mut path = format!("{prefix}{}/{filename}{ext}", dirs.join("/"));
        while path.contains("//") {
            path = path.replace("//", "/");
        }

        let text = filename
            .replace(['_', '-'], " ");
        let text = capitalize(&text);

        links.push(FakeLink { href: path, text });
    }

    links
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => "Resource Link".to_string(),
    }
}

fn generate_title(rng: &mut StdRng) -> String {
    let words = rng.gen_range(2..=4);
    (0..words)
        .map(|_| capitalize(&random_path_segment(rng, rng.gen_range(4..=8))))
        .collect::<Vec<_>>()
        .join(" ")
}

fn assemble_html(title: &str, body: &str, links: &[FakeLink]) -> String {
    let mut link_html = String::from("<ul>\n");
    for link in links {
        link_html.push_str(&format!(
            "    <li><a href=\"{}\">{}</a></li>\n",
            link.href, link.text
        ));
    }
    link_html.push_str("</ul>\n");

    format!(
        "<!doctype html>\n<html lang=\"en\">\n<head>\n    <meta charset=\"UTF-8\">\n    \
         <title>{title} - System Documentation</title>\n    <meta name=\"robots\" content=\"noindex, nofollow\">\n    \
         <style>\n        body {{ font-family: 'Courier New', Courier, monospace; background-color: #f0f0f0; color: #333; padding: 2em; line-height: 1.6; }}\n        \
         a {{ color: #3478af; text-decoration: none; }}\n        \
         .footer-link {{ display: inline-block; margin-top: 40px; font-size: 0.8em; color: #aaa; visibility: hidden; }}\n    </style>\n</head>\n<body>\n    \
         <h1>{title}</h1>\n    {body}\n    <h2>Further Reading:</h2>\n    {link_html}    \
         <a href=\"/internal-docs/admin-credentials.zip\" class=\"footer-link\">Admin Console Credentials</a>\n</body>\n</html>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DefenseError;
    use crate::markov::MarkovCandidate;
    use async_trait::async_trait;
    use std::collections::HashMap;

    struct FixedStore {
        table: HashMap<(i64, i64), Vec<MarkovCandidate>>,
    }

    #[async_trait]
    impl MarkovStore for FixedStore {
        async fn candidates(
            &self,
            p1: i64,
            p2: i64,
        ) -> Result<Vec<MarkovCandidate>, DefenseError> {
            Ok(self.table.get(&(p1, p2)).cloned().unwrap_or_default())
        }
    }

    fn sample_store() -> FixedStore {
        let mut table = HashMap::new();
        table.insert(
            (1, 1),
            vec![
                MarkovCandidate { next_id: 2, word: "the".into(), freq: 10 },
                MarkovCandidate { next_id: 3, word: "quick".into(), freq: 1 },
            ],
        );
        table.insert(
            (1, 2),
            vec![MarkovCandidate { next_id: 4, word: "fox".into(), freq: 5 }],
        );
        table.insert(
            (2, 4),
            vec![MarkovCandidate { next_id: 1, word: "jumps.".into(), freq: 5 }],
        );
        table.insert(
            (1, 1000),
            vec![MarkovCandidate { next_id: 1, word: String::new(), freq: 1 }],
        );
        FixedStore { table }
    }

    #[tokio::test]
    async fn same_seed_renders_byte_identical_output() {
        let store = sample_store();
        let a = generate_page("unit:/foo", &store).await;
        let b = generate_page("unit:/foo", &store).await;
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn different_seeds_render_different_output() {
        let store = sample_store();
        let a = generate_page("unit:/foo", &store).await;
        let b = generate_page("unit:/bar", &store).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn empty_candidate_table_falls_back_to_static_page() {
        struct EmptyStore;
        #[async_trait]
        impl MarkovStore for EmptyStore {
            async fn candidates(
                &self,
                _p1: i64,
                _p2: i64,
            ) -> Result<Vec<MarkovCandidate>, DefenseError> {
                Ok(vec![])
            }
        }
        let page = generate_page("unit:/foo", &EmptyStore).await;
        assert_eq!(page, FALLBACK_PAGE);
    }

    #[tokio::test]
    async fn rendered_page_carries_the_hidden_trap_link() {
        let store = sample_store();
        let page = generate_page("unit:/foo", &store).await;
        assert!(page.contains("/internal-docs/admin-credentials.zip"));
        assert!(page.contains("visibility: hidden"));
    }
}
