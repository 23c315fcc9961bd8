use crate::store::RetrievedChunk;

pub const MAX_CONTEXT_CHUNKS: usize = 10;
pub const CHUNK_DELIMITER: &str = "\n\n---\n\n";

/// Drop chunks whose content was already seen, keep at most
/// [`MAX_CONTEXT_CHUNKS`], and renumber ranks from 1.
pub fn dedup_chunks(chunks: Vec<RetrievedChunk>) -> Vec<RetrievedChunk> {
    let mut kept: Vec<RetrievedChunk> = Vec::with_capacity(MAX_CONTEXT_CHUNKS);
    for chunk in chunks {
        if kept.len() == MAX_CONTEXT_CHUNKS {
            break;
        }
        if kept.iter().any(|k| k.content == chunk.content) {
            continue;
        }
        kept.push(chunk);
    }
    for (i, chunk) in kept.iter_mut().enumerate() {
        chunk.rank = i + 1;
    }
    kept
}

pub fn format_context(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let page = chunk
                .page
                .map(|p| p.to_string())
                .unwrap_or_else(|| "n/a".to_string());
            format!(
                "[{}] Source: {} | Page: {}\n{}",
                i + 1,
                chunk.source,
                page,
                chunk.content
            )
        })
        .collect::<Vec<_>>()
        .join(CHUNK_DELIMITER)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(content: &str, source: &str, rank: usize) -> RetrievedChunk {
        RetrievedChunk {
            content: content.to_string(),
            source: source.to_string(),
            page: None,
            rank,
            score: None,
        }
    }

    #[test]
    fn identical_content_from_different_sources_appears_once() {
        let merged = dedup_chunks(vec![
            chunk("Reduce metformin below eGFR 45", "ada.pdf", 1),
            chunk("Monitor B12", "kdigo.pdf", 2),
            chunk("Reduce metformin below eGFR 45", "kdigo.pdf", 1),
        ]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].source, "ada.pdf");
        assert_eq!(merged[1].content, "Monitor B12");
        assert_eq!(merged[1].rank, 2);
    }

    #[test]
    fn more_than_ten_unique_chunks_are_truncated_in_order() {
        let chunks: Vec<_> = (1..=14)
            .map(|i| chunk(&format!("passage {i}"), "guide.txt", i))
            .collect();

        let merged = dedup_chunks(chunks);
        let context = format_context(&merged);

        assert_eq!(merged.len(), MAX_CONTEXT_CHUNKS);
        assert_eq!(context.matches("Source: guide.txt").count(), 10);
        assert!(context.contains("[10] Source: guide.txt | Page: n/a\npassage 10"));
        assert!(!context.contains("passage 11"));
    }

    #[test]
    fn format_marks_pages_and_delimits() {
        let mut first = chunk("Titrate basal insulin", "insulin.pdf", 1);
        first.page = Some(7);
        let second = chunk("Check feet yearly", "care.txt", 2);

        assert_eq!(
            format_context(&[first, second]),
            "[1] Source: insulin.pdf | Page: 7\nTitrate basal insulin\n\n---\n\n\
             [2] Source: care.txt | Page: n/a\nCheck feet yearly"
        );
    }

    #[test]
    fn empty_context_is_empty_string() {
        assert_eq!(format_context(&[]), "");
    }
}
