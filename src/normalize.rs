//! Name Normalization
//!
//! Reformats raw contact display names into a form the grammar compiler
//! can digest: spoken replacements for symbols, parenthetical removal,
//! accent folding, and " dot " insertion for mid-word periods.

/// Latin-1 Supplement (U+00C0..=U+00FF) to closest ASCII letter.
/// Not all letters map well; Eth and Thorn become 'D', the
/// multiplication and division signs become spaces.
const LATIN1_LETTERS: &[u8; 64] =
    b"AAAAAAACEEEEIIIIDNOOOOO OUUUUYDsaaaaaaaceeeeiiiidnooooo ouuuuydy";
const LATIN1_BASE: u32 = 0x00c0;

/// Reformat a raw contact name into a grammar-safe pronunciation key.
///
/// Pure and total; idempotent on its own output once `&`/`@`, parens,
/// accents, and mid-word dots have been resolved.
pub fn scrub(name: &str) -> String {
    // replace '&' with ' and ', '@' with ' at '
    let mut name = name.replace('&', " and ").replace('@', " at ");

    // remove '(...)' spans; an unmatched paren stops the loop and is kept
    loop {
        let Some(i) = name.find('(') else { break };
        let Some(j) = name[i..].find(')').map(|j| i + j) else { break };
        name = format!("{} {}", &name[..i], &name[j + 1..]);
    }

    // fold Latin-1 Supplement letters to basic ASCII
    if name.chars().any(is_latin1_supplement) {
        name = name
            .chars()
            .map(|c| {
                if is_latin1_supplement(c) {
                    LATIN1_LETTERS[(c as u32 - LATIN1_BASE) as usize] as char
                } else {
                    c
                }
            })
            .collect();
    }

    // a '.' directly followed by an alphanumeric becomes ' dot '
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '.' && chars.peek().is_some_and(|n| n.is_alphanumeric()) {
            out.push_str(" dot ");
        } else {
            out.push(c);
        }
    }

    out.trim().to_string()
}

fn is_latin1_supplement(c: char) -> bool {
    (LATIN1_BASE..LATIN1_BASE + LATIN1_LETTERS.len() as u32).contains(&(c as u32))
}
