//! Digit masks for phone and date inputs. A mask is plain text where `#` and
//! `X` mark digit slots and every other character is a literal.

fn is_slot(ch: char) -> bool {
    ch == '#' || ch == 'X'
}

/// Keep only the ASCII digits of `input`.
pub fn digits_only(input: &str) -> String {
    input.chars().filter(char::is_ascii_digit).collect()
}

/// Number of digit slots in `mask`.
pub fn slot_count(mask: &str) -> usize {
    mask.chars().filter(|ch| is_slot(*ch)).count()
}

/// Place the digits of `input` into the slots of `mask`. Literals are copied
/// up to the last placed digit; extra digits are dropped.
///
/// `apply_mask("(##) ####-####", "11987")` gives `"(11) 987"`.
pub fn apply_mask(mask: &str, input: &str) -> String {
    let digits = digits_only(input);
    let mut digits = digits.chars();
    let mut out = String::new();
    let mut pending = String::new();

    for ch in mask.chars() {
        if is_slot(ch) {
            match digits.next() {
                Some(digit) => {
                    out.push_str(&pending);
                    pending.clear();
                    out.push(digit);
                }
                None => break,
            }
        } else {
            pending.push(ch);
        }
    }

    out
}

/// Render `input` through `mask` for display, with `_` in empty slots.
pub fn mask_placeholder(mask: &str, input: &str) -> String {
    let digits = digits_only(input);
    let mut digits = digits.chars();
    mask.chars()
        .map(|ch| {
            if is_slot(ch) {
                digits.next().unwrap_or('_')
            } else {
                ch
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const LANDLINE: &str = "(##) ####-####";
    const CELL: &str = "(##) #####-####";

    #[test]
    fn partial_input_stops_after_last_digit() {
        assert_eq!(apply_mask(LANDLINE, "11"), "(11");
        assert_eq!(apply_mask(LANDLINE, "113"), "(11) 3");
        assert_eq!(apply_mask(LANDLINE, ""), "");
    }

    #[test]
    fn full_input_fills_every_slot() {
        assert_eq!(apply_mask(CELL, "11987654321"), "(11) 98765-4321");
        assert_eq!(apply_mask(LANDLINE, "1133334444"), "(11) 3333-4444");
    }

    #[test]
    fn formatting_in_input_is_ignored_and_overflow_dropped() {
        assert_eq!(apply_mask(LANDLINE, "(11) 3333-44449999"), "(11) 3333-4444");
        assert_eq!(apply_mask("##/##/####", "a1b2"), "12");
    }

    #[test]
    fn x_is_also_a_slot() {
        assert_eq!(apply_mask("XX:XX", "0930"), "09:30");
    }

    #[test]
    fn placeholder_shows_empty_slots() {
        assert_eq!(mask_placeholder("##:##", "9"), "9_:__");
        assert_eq!(mask_placeholder(LANDLINE, ""), "(__) ____-____");
    }

    #[test]
    fn counts_slots() {
        assert_eq!(slot_count(CELL), 11);
        assert_eq!(digits_only("(11) 3333-4444"), "1133334444");
    }
}
