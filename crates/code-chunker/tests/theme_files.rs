use theme_code_chunker::{ChunkKind, Chunker, ParseSource};

const MAIN_PRODUCT: &str = r#"<section class="product">
  {%- render 'price', product: product -%}
  {% if product.available %}
    <button>{{ 'products.add' | t }}</button>
  {% else %}
    <button disabled>{{ 'products.sold_out' | t }}</button>
  {% endif %}
</section>

{% schema %}
{
  "name": "Product information",
  "settings": [
    {
      "type": "checkbox",
      "id": "enable_sticky_info",
      "label": "Enable sticky info"
    }
  ],
  "blocks": [
    { "type": "title", "name": "Title" }
  ]
}
{% endschema %}
"#;

#[test]
fn section_file_yields_ordered_structural_chunks() {
    let chunker = Chunker::default();
    let chunks = chunker.chunk("sections/main-product.liquid", MAIN_PRODUCT);

    let kinds: Vec<_> = chunks.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            ChunkKind::Render,
            ChunkKind::Conditional,
            ChunkKind::Setting,
            ChunkKind::Block,
        ]
    );
    assert!(chunks.windows(2).all(|w| w[0].line_start <= w[1].line_start));
    assert!(chunks.iter().all(|c| c.file == "sections/main-product.liquid"));
    assert!(chunks.iter().all(|c| c.estimated_tokens() > 0));

    let setting = &chunks[2];
    assert_eq!(setting.metadata.setting_id.as_deref(), Some("enable_sticky_info"));
    assert_eq!((setting.line_start, setting.line_end), (14, 18));
    assert_eq!(
        setting.metadata.schema_name.as_deref(),
        Some("Product information")
    );
}

#[test]
fn malformed_schema_degrades_without_failing() {
    let broken = MAIN_PRODUCT.replace(
        "\"label\": \"Enable sticky info\"",
        "\"label\": \"Enable sticky info\",",
    );
    let chunker = Chunker::default();
    let chunks = chunker.chunk("sections/main-product.liquid", &broken);

    let setting = chunks
        .iter()
        .find(|c| c.kind == ChunkKind::Setting)
        .expect("regex pass recovers the setting");
    assert_eq!(setting.metadata.source, ParseSource::Regex);
    assert_eq!(
        setting.metadata.setting_id.as_deref(),
        Some("enable_sticky_info")
    );
    assert!(chunks.iter().any(|c| c.kind == ChunkKind::Render));
}

#[test]
fn unparseable_schema_becomes_single_raw_chunk() {
    let text = "{% schema %}\n{ \"name\": \"Broken\" \"settings\": [] }\n{% endschema %}\n";
    let chunker = Chunker::default();
    let chunks = chunker.chunk("sections/broken.liquid", text);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].kind, ChunkKind::RawSchema);
    assert_eq!((chunks[0].line_start, chunks[0].line_end), (1, 3));
}

#[test]
fn broken_script_falls_back_to_regex() {
    let text = "function ok() {\n  return 1;\n}\n\nfunction broken( {\n";
    let chunker = Chunker::default();
    let chunks = chunker.chunk("assets/global.js", text);
    assert!(chunks.iter().all(|c| c.metadata.source == ParseSource::Regex));
    let names: Vec<_> = chunks
        .iter()
        .filter_map(|c| c.metadata.function_name.as_deref())
        .collect();
    assert_eq!(names, vec!["ok", "broken"]);
}

#[test]
fn json_template_sections_reference_their_types() {
    let text = "{\n  \"sections\": {\n    \"main\": { \"type\": \"main-product\" }\n  },\n  \"order\": [\"main\"]\n}\n";
    let chunker = Chunker::default();
    let chunks = chunker.chunk("templates/product.json", text);
    let references: Vec<_> = chunks
        .iter()
        .flat_map(|c| c.metadata.references.iter().map(String::as_str))
        .collect();
    assert_eq!(references, vec!["main-product"]);
}
