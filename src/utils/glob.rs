use regex::Regex;

/// Compiles a Redis style glob pattern into an anchored regular expression.
///
/// Supported syntax:
///
/// * `*` matches any sequence of characters, including none.
/// * `?` matches exactly one character.
/// * `[abc]`, `[a-z]` match one character of the class, `[^abc]` or `[!abc]` negate it.
/// * `\x` matches `x` literally.
///
/// An unterminated `[` is matched literally.
pub fn compile(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&translate(pattern))
}

fn translate(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut regex = String::from("(?s)^");
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '\\' if i + 1 < chars.len() => {
                i += 1;
                push_literal(&mut regex, chars[i]);
            }
            '[' => match translate_class(&chars[i + 1..]) {
                Some((class, consumed)) => {
                    regex.push_str(&class);
                    i += consumed;
                }
                None => push_literal(&mut regex, '['),
            },
            c => push_literal(&mut regex, c),
        }
        i += 1;
    }

    regex.push('$');
    regex
}

/// Translates the body of a bracket class, `chars` starting right after the opening `[`.
/// Returns the regex class and how many characters were consumed, including the closing `]`.
fn translate_class(chars: &[char]) -> Option<(String, usize)> {
    let mut class = String::from("[");
    let mut i = 0;

    let negated = matches!(chars.first(), Some('^') | Some('!'));
    if negated {
        class.push('^');
        i += 1;
    }

    let mut empty = true;
    loop {
        let c = *chars.get(i)?;
        let range_end = match (chars.get(i + 1), chars.get(i + 2)) {
            (Some('-'), Some(&end)) if end != ']' => Some(end),
            _ => None,
        };

        match (c, range_end) {
            (']', _) => break,
            ('\\', _) => {
                i += 1;
                push_class_literal(&mut class, *chars.get(i)?);
            }
            (start, Some(end)) => {
                let (low, high) = if start <= end { (start, end) } else { (end, start) };
                push_class_literal(&mut class, low);
                class.push('-');
                push_class_literal(&mut class, high);
                i += 2;
            }
            (c, None) => push_class_literal(&mut class, c),
        }
        empty = false;
        i += 1;
    }

    if empty {
        // `[]` never matches, `[^]` matches any character.
        let class = if negated { "." } else { r"[^\s\S]" };
        return Some((class.to_string(), i + 1));
    }

    class.push(']');
    Some((class, i + 1))
}

fn push_literal(regex: &mut String, c: char) {
    regex.push_str(&regex::escape(c.encode_utf8(&mut [0; 4])));
}

fn push_class_literal(class: &mut String, c: char) {
    if c.is_ascii_punctuation() {
        class.push('\\');
    }
    class.push(c);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, input: &str) -> bool {
        compile(pattern).unwrap().is_match(input)
    }

    #[test]
    fn wildcards() {
        assert!(matches("*", ""));
        assert!(matches("*", "anything/at:all"));
        assert!(matches("u*", "user"));
        assert!(matches("u*", "usr"));
        assert!(!matches("u*", "admin"));
        assert!(matches("h?llo", "hello"));
        assert!(!matches("h?llo", "heello"));
        assert!(matches("*:*", "user:1"));
    }

    #[test]
    fn classes() {
        assert!(matches("h[ae]llo", "hallo"));
        assert!(!matches("h[ae]llo", "hillo"));
        assert!(matches("h[^e]llo", "hallo"));
        assert!(!matches("h[^e]llo", "hello"));
        assert!(matches("h[!e]llo", "hallo"));
        assert!(matches("h[a-c]llo", "hbllo"));
        assert!(matches("h[c-a]llo", "hbllo"));
        assert!(!matches("h[a-c]llo", "hdllo"));
        assert!(matches("a[-]b", "a-b"));
        assert!(!matches("a[]b", "ab"));
        assert!(!matches("a[]b", "axb"));
        assert!(matches("a[^]b", "axb"));
    }

    #[test]
    fn literals_are_escaped() {
        assert!(matches("a.b", "a.b"));
        assert!(!matches("a.b", "axb"));
        assert!(matches("a+(b)|$", "a+(b)|$"));
        assert!(matches("a\\*", "a*"));
        assert!(!matches("a\\*", "ab"));
        assert!(matches("a[b", "a[b"));
        assert!(matches("[&&]", "&"));
    }

    #[test]
    fn anchored() {
        assert!(!matches("user", "superuser"));
        assert!(!matches("user", "users"));
    }
}
