//! Executes one modification against an in-memory buffer, given a region
//! already resolved by the locator (§4.5). Pure; never touches disk.

use crate::locator::LineRange;

pub fn replace_range(buffer: &mut Vec<String>, range: LineRange, content_lines: Vec<String>) {
    buffer.splice(range.start..=range.end, content_lines);
}

pub fn delete_range(buffer: &mut Vec<String>, range: LineRange) {
    buffer.drain(range.start..=range.end);
}

pub fn insert_after(buffer: &mut Vec<String>, range: LineRange, content_lines: Vec<String>) {
    let at = range.end + 1;
    buffer.splice(at..at, content_lines);
}

pub fn insert_before(buffer: &mut Vec<String>, range: LineRange, content_lines: Vec<String>) {
    let at = range.start;
    buffer.splice(at..at, content_lines);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buf(text: &str) -> Vec<String> {
        text.lines().map(str::to_string).collect()
    }

    #[test]
    fn replace_range_splices_content_in_place() {
        let mut buffer = buf("a\nb\nc\n");
        replace_range(&mut buffer, LineRange { start: 1, end: 1 }, vec!["B".to_string()]);
        assert_eq!(buffer, vec!["a", "B", "c"]);
    }

    #[test]
    fn delete_range_removes_inclusive_span() {
        let mut buffer = buf("a\nb\nc\nd\n");
        delete_range(&mut buffer, LineRange { start: 1, end: 2 });
        assert_eq!(buffer, vec!["a", "d"]);
    }

    #[test]
    fn insert_after_lands_directly_following_the_region() {
        let mut buffer = buf("a\nb\nc\n");
        insert_after(&mut buffer, LineRange { start: 0, end: 0 }, vec!["x".to_string()]);
        assert_eq!(buffer, vec!["a", "x", "b", "c"]);
    }

    #[test]
    fn insert_before_lands_directly_preceding_the_region() {
        let mut buffer = buf("a\nb\nc\n");
        insert_before(&mut buffer, LineRange { start: 2, end: 2 }, vec!["x".to_string()]);
        assert_eq!(buffer, vec!["a", "b", "x", "c"]);
    }
}
