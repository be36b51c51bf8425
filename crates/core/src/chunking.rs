use crate::models::ChunkingOptions;

/// Splits raw document text into overlapping retrieval units.
///
/// Paragraphs (double-newline separated) are greedily packed into chunks of
/// at most `target_size` characters. Each new chunk is seeded with the
/// trailing words of the previous one so local context survives the cut.
/// Documents with too few paragraph breaks to produce at least 3 chunks fall
/// back to a fixed word-window split.
///
/// Pure function of its input: same text and options, same chunks.
pub fn chunk_text(text: &str, options: ChunkingOptions) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let chunks = chunk_by_paragraph(text, options);
    if chunks.len() >= 3 {
        return chunks;
    }

    chunk_by_word_window(text, options)
}

fn chunk_by_paragraph(text: &str, options: ChunkingOptions) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in text.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }

        if !current.is_empty() && current.len() + paragraph.len() + 2 > options.target_size {
            let closed = current.trim().to_string();
            if !closed.is_empty() {
                chunks.push(closed.clone());
            }

            current = if options.overlap > 0 {
                format!("{} {}", overlap_seed(&closed, options.overlap), paragraph)
            } else {
                paragraph.to_string()
            };
        } else if current.is_empty() {
            current = paragraph.to_string();
        } else {
            current.push_str("\n\n");
            current.push_str(paragraph);
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

/// Trailing words of a closed chunk, prepended to the next one. Takes the
/// last `overlap / 4` words, or the last 10 when the chunk is shorter.
fn overlap_seed(closed: &str, overlap: usize) -> String {
    let words: Vec<&str> = closed.split_whitespace().collect();
    let take = overlap / 4;
    let tail = if words.len() > take {
        &words[words.len() - take..]
    } else {
        &words[words.len().saturating_sub(10)..]
    };
    tail.join(" ")
}

fn chunk_by_word_window(text: &str, options: ChunkingOptions) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let step = options.target_size.saturating_sub(options.overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + options.target_size).min(words.len());
        let chunk = words[start..end].join(" ");
        if !chunk.trim().is_empty() {
            chunks.push(chunk.trim().to_string());
        }
        if end == words.len() {
            break;
        }
        start += step;
    }

    chunks
}
