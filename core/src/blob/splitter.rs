//! Line-accurate content splitting

use super::Blob;

/// Split text into lines, keeping each line's terminator (`\n`, `\r\n` or a lone `\r`).
///
/// A trailing fragment without a terminator is returned as the last line.
pub fn split_lines(content: &str) -> Vec<&str> {
    let bytes = content.as_bytes();
    let mut lines = Vec::new();
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                lines.push(&content[start..=i]);
                start = i + 1;
            }
            b'\r' => {
                if bytes.get(i + 1) == Some(&b'\n') {
                    i += 1;
                }
                lines.push(&content[start..=i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }

    if start < bytes.len() {
        lines.push(&content[start..]);
    }

    lines
}

/// Partition file content into blobs of at most `max_lines` lines.
///
/// Files within the limit produce one blob named after the file itself. Larger files
/// produce `ceil(lines / max_lines)` blobs named `path#chunk{i}of{n}`, 1-indexed.
pub fn split(logical_path: &str, content: &str, max_lines: usize) -> Vec<Blob> {
    let max_lines = max_lines.max(1);
    let lines = split_lines(content);

    if lines.len() <= max_lines {
        return vec![Blob::new(logical_path, content, logical_path)];
    }

    let total = lines.len().div_ceil(max_lines);
    lines
        .chunks(max_lines)
        .enumerate()
        .map(|(index, chunk)| {
            Blob::new(
                format!("{}#chunk{}of{}", logical_path, index + 1, total),
                chunk.concat(),
                logical_path,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered_lines(count: usize) -> String {
        (1..=count).map(|n| format!("line {}\n", n)).collect()
    }

    #[test]
    fn test_split_lines_preserves_terminators() {
        let content = "a\nb\r\nc\rd";
        assert_eq!(split_lines(content), vec!["a\n", "b\r\n", "c\r", "d"]);
        assert_eq!(split_lines(content).concat(), content);
    }

    #[test]
    fn test_split_lines_edge_cases() {
        assert!(split_lines("").is_empty());
        assert_eq!(split_lines("\n\n"), vec!["\n", "\n"]);
        assert_eq!(split_lines("\r\r\n"), vec!["\r", "\r\n"]);
        assert_eq!(split_lines("no newline"), vec!["no newline"]);
    }

    #[test]
    fn test_small_file_is_single_blob() {
        let content = numbered_lines(10);
        let blobs = split("a.py", &content, 800);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].logical_path, "a.py");
        assert_eq!(blobs[0].source_path, "a.py");
        assert_eq!(blobs[0].content, content);
    }

    #[test]
    fn test_empty_file_is_single_blob() {
        let blobs = split("empty.txt", "", 800);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs[0].content, "");
    }

    #[test]
    fn test_large_file_is_chunked() {
        let content = numbered_lines(1700);
        let blobs = split("b.py", &content, 800);

        let paths: Vec<_> = blobs.iter().map(|b| b.logical_path.as_str()).collect();
        assert_eq!(paths, vec!["b.py#chunk1of3", "b.py#chunk2of3", "b.py#chunk3of3"]);

        assert!(blobs[0].content.starts_with("line 1\n"));
        assert!(blobs[0].content.ends_with("line 800\n"));
        assert!(blobs[1].content.starts_with("line 801\n"));
        assert!(blobs[1].content.ends_with("line 1600\n"));
        assert!(blobs[2].content.starts_with("line 1601\n"));
        assert!(blobs[2].content.ends_with("line 1700\n"));
        assert!(blobs.iter().all(|b| b.source_path == "b.py"));
    }

    #[test]
    fn test_exact_threshold_is_not_split() {
        let blobs = split("c.py", &numbered_lines(800), 800);
        assert_eq!(blobs.len(), 1);
        let blobs = split("c.py", &numbered_lines(801), 800);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[1].content, "line 801\n");
    }

    #[test]
    fn test_split_is_deterministic_and_lossless() {
        let samples = [
            String::from("x\r\ny\rz\n\n\ntrailing"),
            numbered_lines(37),
            String::from("ünïcödé\nline\r\n"),
        ];
        for content in samples {
            for max_lines in [1, 2, 3, 5, 100] {
                let first = split("f.txt", &content, max_lines);
                let second = split("f.txt", &content, max_lines);
                assert_eq!(first, second);
                let rebuilt: String = first.iter().map(|b| b.content.as_str()).collect();
                assert_eq!(rebuilt, content);
            }
        }
    }

    #[test]
    fn test_trailing_fragment_is_kept() {
        let blobs = split("t.txt", "1\n2\n3", 2);
        assert_eq!(blobs.len(), 2);
        assert_eq!(blobs[1].content, "3");
        assert_eq!(blobs[1].logical_path, "t.txt#chunk2of2");
    }
}
