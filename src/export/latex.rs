//! LaTeX to readable text.
//!
//! Output never contains `\`-commands, braces, `$` or `~`, and choice
//! markers are normalized last, so `to_readable` is idempotent.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Command name → replacement. Names not listed are stripped.
const COMMANDS: &[(&str, &str)] = &[
    // Greek
    ("alpha", "α"), ("beta", "β"), ("gamma", "γ"), ("delta", "δ"),
    ("epsilon", "ε"), ("varepsilon", "ε"), ("zeta", "ζ"), ("eta", "η"),
    ("theta", "θ"), ("vartheta", "θ"), ("iota", "ι"), ("kappa", "κ"),
    ("lambda", "λ"), ("mu", "μ"), ("nu", "ν"), ("xi", "ξ"), ("pi", "π"),
    ("rho", "ρ"), ("sigma", "σ"), ("tau", "τ"), ("upsilon", "υ"),
    ("phi", "φ"), ("varphi", "φ"), ("chi", "χ"), ("psi", "ψ"),
    ("omega", "ω"), ("Gamma", "Γ"), ("Delta", "Δ"), ("Theta", "Θ"),
    ("Lambda", "Λ"), ("Xi", "Ξ"), ("Pi", "Π"), ("Sigma", "Σ"),
    ("Phi", "Φ"), ("Psi", "Ψ"), ("Omega", "Ω"),
    // comparison
    ("le", "≤"), ("leq", "≤"), ("leqslant", "≤"), ("ge", "≥"),
    ("geq", "≥"), ("geqslant", "≥"), ("ne", "≠"), ("neq", "≠"),
    ("approx", "≈"), ("equiv", "≡"), ("sim", "∼"), ("lt", "<"), ("gt", ">"),
    // arithmetic
    ("times", "×"), ("div", "÷"), ("cdot", "·"), ("pm", "±"), ("mp", "∓"),
    ("infty", "∞"), ("sqrt", "√"), ("square", "□"), ("circ", "°"),
    ("degree", "°"), ("angle", "∠"), ("triangle", "△"), ("perp", "⊥"),
    ("parallel", "∥"), ("therefore", "∴"), ("because", "∵"),
    ("cdots", "⋯"), ("ldots", "…"), ("dots", "…"),
    // arrows
    ("rightarrow", "→"), ("to", "→"), ("leftarrow", "←"),
    ("Rightarrow", "⇒"), ("Leftarrow", "⇐"), ("leftrightarrow", "↔"),
    ("Leftrightarrow", "⇔"), ("iff", "⇔"), ("implies", "⇒"),
    // sets
    ("in", "∈"), ("notin", "∉"), ("subset", "⊂"), ("subseteq", "⊆"),
    ("supset", "⊃"), ("supseteq", "⊇"), ("cup", "∪"), ("cap", "∩"),
    ("emptyset", "∅"), ("varnothing", "∅"), ("forall", "∀"), ("exists", "∃"),
    // sized delimiters and spacing leave nothing behind
    ("left", ""), ("right", ""), ("big", ""), ("Big", ""), ("quad", " "),
    ("qquad", " "),
];

/// Unicode vulgar fractions for `\frac{a}{b}`.
const FRACTIONS: &[((&str, &str), &str)] = &[
    (("1", "2"), "½"), (("1", "3"), "⅓"), (("2", "3"), "⅔"),
    (("1", "4"), "¼"), (("3", "4"), "¾"), (("1", "5"), "⅕"),
    (("2", "5"), "⅖"), (("3", "5"), "⅗"), (("4", "5"), "⅘"),
    (("1", "6"), "⅙"), (("5", "6"), "⅚"), (("1", "8"), "⅛"),
    (("3", "8"), "⅜"), (("5", "8"), "⅝"), (("7", "8"), "⅞"),
];

static WRAPPER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\\(?:mathrm|text|textbf|textit|operatorname|mathbf|mathit|boldsymbol)\s*\{([^{}]*)\}")
        .unwrap()
});
static FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[dt]?frac\s*\{([^{}]*)\}\s*\{([^{}]*)\}").unwrap());
static COMMAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\([a-zA-Z]+)").unwrap());
static ESCAPED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\\([^a-zA-Z])").unwrap());
static MARKER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*\(([1-9])\)").unwrap());
static LEADING_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\n(\([1-9]\))").unwrap());

/// Convert OCR markdown/LaTeX into plain readable text.
pub fn to_readable(text: &str) -> String {
    // Math delimiters
    let mut out = text
        .replace("\\(", "")
        .replace("\\)", "")
        .replace("\\[", "")
        .replace("\\]", "")
        .replace('$', "")
        .replace('~', " ");

    out = replace_until_stable(&out, &WRAPPER, |caps| caps[1].to_string());
    out = replace_until_stable(&out, &FRACTION, |caps| {
        let (num, den) = (caps[1].trim(), caps[2].trim());
        FRACTIONS
            .iter()
            .find(|((n, d), _)| *n == num && *d == den)
            .map(|(_, glyph)| glyph.to_string())
            .unwrap_or_else(|| format!("{num}/{den}"))
    });

    out = COMMAND
        .replace_all(&out, |caps: &Captures| lookup_command(&caps[1]).to_string())
        .into_owned();

    // `\\`, `\,`, `\{`, `\%` and friends
    out = ESCAPED
        .replace_all(&out, |caps: &Captures| match &caps[1] {
            "\\" | "," | ";" | ":" | " " => " ".to_string(),
            "!" => String::new(),
            other => other.to_string(),
        })
        .into_owned();

    out.retain(|c| c != '{' && c != '}' && c != '\\');

    // Choice markers go last so earlier passes cannot shift them.
    let out = MARKER.replace_all(&out, "\n($1)");
    LEADING_MARKER.replace(&out, "$1").into_owned()
}

fn lookup_command(name: &str) -> &'static str {
    COMMANDS
        .iter()
        .find(|(cmd, _)| *cmd == name)
        .map(|(_, glyph)| *glyph)
        .unwrap_or("")
}

fn replace_until_stable<F>(text: &str, re: &Regex, f: F) -> String
where
    F: Fn(&Captures) -> String,
{
    let mut current = text.to_string();
    loop {
        let next = re.replace_all(&current, |caps: &Captures| f(caps)).into_owned();
        if next == current {
            return next;
        }
        current = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_delimiters_and_tilde() {
        assert_eq!(to_readable("\\(x+1\\) and $y$ and \\[z\\]"), "x+1 and y and z");
        assert_eq!(to_readable("a~b"), "a b");
    }

    #[test]
    fn unwraps_text_wrappers() {
        assert_eq!(to_readable("\\mathrm{cm}"), "cm");
        assert_eq!(to_readable("\\text{넓이}"), "넓이");
        assert_eq!(to_readable("\\operatorname{lcm}(a, b)"), "lcm(a, b)");
        assert_eq!(to_readable("\\textbf{\\text{nested}}"), "nested");
    }

    #[test]
    fn fractions_prefer_vulgar_glyphs() {
        assert_eq!(to_readable("\\frac{1}{2}"), "½");
        assert_eq!(to_readable("\\dfrac{3}{4}"), "¾");
        assert_eq!(to_readable("\\frac{7}{9}"), "7/9");
        assert_eq!(to_readable("\\frac{\\frac{1}{2}}{3}"), "½/3");
    }

    #[test]
    fn commands_match_whole_tokens() {
        assert_eq!(to_readable("a \\le b"), "a ≤ b");
        assert_eq!(to_readable("a \\leq b"), "a ≤ b");
        assert_eq!(to_readable("\\left( x \\right)"), "( x )");
        assert_eq!(to_readable("\\ne"), "≠");
        assert_eq!(to_readable("\\neq"), "≠");
        assert_eq!(to_readable("3 \\times 4 \\div 2"), "3 × 4 ÷ 2");
        assert_eq!(to_readable("\\sqrt{2}"), "√2");
        assert_eq!(to_readable("\\alpha\\beta"), "αβ");
    }

    #[test]
    fn unknown_commands_are_stripped() {
        assert_eq!(to_readable("\\hspace{1cm}x"), "1cmx");
        assert_eq!(to_readable("\\unknowncmd y"), " y");
    }

    #[test]
    fn braces_removed_last() {
        assert_eq!(to_readable("x^{2}+y_{1}"), "x^2+y_1");
    }

    #[test]
    fn escaped_characters() {
        assert_eq!(to_readable("50\\%"), "50%");
        assert_eq!(to_readable("a\\,b"), "a b");
        assert_eq!(to_readable("\\{1, 2\\}"), "1, 2");
    }

    #[test]
    fn choice_markers_on_own_line() {
        assert_eq!(
            to_readable("Which? (1) 2 (2) 3   (3) 4"),
            "Which?\n(1) 2\n(2) 3\n(3) 4"
        );
    }

    #[test]
    fn no_newline_at_text_start() {
        assert_eq!(to_readable("(1) first (2) second"), "(1) first\n(2) second");
        assert_eq!(to_readable("   (1) first"), "(1) first");
    }

    #[test]
    fn unicode_passes_through() {
        let already = "x ≤ ½ × π\n(1) α";
        assert_eq!(to_readable(already), already);
    }

    #[test]
    fn conversion_is_idempotent() {
        let samples = [
            "$\\frac{1}{2} \\le x \\leq \\sqrt{3}$ (1) \\alpha (2) \\text{cm}",
            "\\left( a~\\times~b \\right) \\neq \\frac{5}{7}",
            "~(1) spaced \\, out",
            "{(2)} braces",
            "문제: $x^{2}$ 의 값은? (1) 1 (2) 2 (3) 3 (4) 4 (5) 5",
            "plain text",
            "",
        ];
        for sample in samples {
            let once = to_readable(sample);
            assert_eq!(to_readable(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn output_has_no_commands_or_braces() {
        let out = to_readable("\\foo{\\bar{x}} \\\\ \\{ $ ~ \\");
        assert!(!out.contains('\\'));
        assert!(!out.contains('{'));
        assert!(!out.contains('}'));
        assert!(!out.contains('$'));
        assert!(!out.contains('~'));
    }
}
