//! Server-rendered SVG captcha.
//!
//! Generates a 5-character code from an ambiguity-free alphabet and renders
//! it as an inline SVG with per-glyph jitter, rotation and noise strokes.
//! Storage and expiry live in `stores::captcha`; this module is pure
//! generation.

use rand::Rng;

/// 0/O, 1/I/L are excluded so users never have to guess between lookalikes.
const CHARSET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const CODE_LEN: usize = 5;

const WIDTH: i32 = 180;
const HEIGHT: i32 = 64;

#[derive(Debug, Clone)]
pub struct GeneratedCaptcha {
    pub answer: String,
    pub svg: String,
}

/// Mint a fresh captcha: the answer and its SVG rendering.
pub fn generate() -> GeneratedCaptcha {
    let mut rng = rand::rng();

    let answer: String = (0..CODE_LEN)
        .map(|_| CHARSET[rng.random_range(0..CHARSET.len())] as char)
        .collect();

    let svg = render_svg(&answer, &mut rng);

    GeneratedCaptcha { answer, svg }
}

fn render_svg(answer: &str, rng: &mut impl Rng) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{HEIGHT}" viewBox="0 0 {WIDTH} {HEIGHT}"><rect width="100%" height="100%" fill="#f5f3ee"/>"#
    );

    for _ in 0..4 {
        svg.push_str(&noise_path(rng));
    }

    let cell = WIDTH / (CODE_LEN as i32 + 1);
    for (i, ch) in answer.chars().enumerate() {
        let x = cell * (i as i32 + 1) + rng.random_range(-4..=4);
        let y = HEIGHT / 2 + rng.random_range(-6..=10);
        let rotate = rng.random_range(-28..=28);
        let size = rng.random_range(26..=34);
        let shade = rng.random_range(40..=110);

        svg.push_str(&format!(
            r#"<text x="{x}" y="{y}" font-family="monospace" font-size="{size}" fill="rgb({shade},{shade},{shade})" transform="rotate({rotate} {x} {y})">{ch}</text>"#
        ));
    }

    svg.push_str("</svg>");
    svg
}

fn noise_path(rng: &mut impl Rng) -> String {
    let y0 = rng.random_range(0..HEIGHT);
    let y1 = rng.random_range(0..HEIGHT);
    let y2 = rng.random_range(0..HEIGHT);
    let shade = rng.random_range(120..=180);

    format!(
        r#"<path d="M0 {y0} Q {} {y1} {WIDTH} {y2}" stroke="rgb({shade},{shade},{shade})" stroke-width="1.5" fill="none"/>"#,
        WIDTH / 2
    )
}

/// Case-insensitive answer comparison.
pub fn matches(submitted: &str, answer: &str) -> bool {
    submitted.trim().eq_ignore_ascii_case(answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_uses_unambiguous_charset() {
        let captcha = generate();

        assert_eq!(captcha.answer.len(), CODE_LEN);
        assert!(
            captcha
                .answer
                .bytes()
                .all(|b| CHARSET.contains(&b))
        );
    }

    #[test]
    fn svg_is_well_formed_enough() {
        let captcha = generate();

        assert!(captcha.svg.starts_with("<svg"));
        assert!(captcha.svg.ends_with("</svg>"));
        assert_eq!(captcha.svg.matches("<text").count(), CODE_LEN);
    }

    #[test]
    fn matches_ignores_case_and_whitespace() {
        assert!(matches(" abcde ", "ABCDE"));
        assert!(matches("AbCdE", "ABCDE"));
        assert!(!matches("ABCDF", "ABCDE"));
        assert!(!matches("", "ABCDE"));
    }

    #[test]
    fn successive_captchas_differ() {
        // 31^5 answers; a collision here means the RNG is broken
        assert_ne!(generate().answer, generate().answer);
    }
}
