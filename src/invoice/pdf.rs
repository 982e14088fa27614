//! PDF text extraction.

use lopdf::Document;

/// Text of each page, in page order. Pages whose text cannot be decoded are
/// returned as empty strings so page numbering stays aligned.
pub fn pdf_text(bytes: &[u8]) -> anyhow::Result<Vec<String>> {
    let doc = Document::load_mem(bytes)
        .map_err(|e| anyhow::anyhow!("Failed to parse PDF: {}", e))?;

    let pages = doc
        .get_pages()
        .keys()
        .map(|page_num| match doc.extract_text(&[*page_num]) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!(page = page_num, error = %e, "Could not extract page text");
                String::new()
            }
        })
        .collect::<Vec<_>>();

    if pages.is_empty() {
        anyhow::bail!("PDF has no pages");
    }
    Ok(pages)
}

/// Single-page PDF with one text block per line.
#[cfg(test)]
pub(crate) fn sample_pdf(lines: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new(
            "Tf",
            vec![Object::Name(b"F1".to_vec()), Object::Integer(12)],
        ));
        operations.push(Operation::new(
            "Td",
            vec![Object::Integer(72), Object::Integer(760 - 16 * i as i64)],
        ));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save pdf");
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_text_from_generated_pdf() {
        let bytes = sample_pdf(&["Invoice Number: INV-1001", "Total: $1,500.00"]);
        let pages = pdf_text(&bytes).expect("text");
        assert_eq!(pages.len(), 1);
        assert!(pages[0].contains("INV-1001"));
        assert!(pages[0].contains("1,500.00"));
    }

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = pdf_text(b"definitely not a pdf").expect_err("garbage input");
        assert!(err.to_string().contains("Failed to parse PDF"));
    }
}
