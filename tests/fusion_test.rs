use fusionrag::fuse;
use fusionrag::Document;
use fusionrag::DocumentIdentity;
use fusionrag::FusionRagError;
use fusionrag::RankFusion;
use fusionrag::RankedList;
use fusionrag::Result;

const LISTS_JSON: &str = r#"[
    [
        {"id": "x", "text": "Paris is the capital", "score": 0.9},
        {"id": "y", "text": "Berlin is large", "score": 0.5},
        {"text": "unrelated text", "score": 0.2}
    ],
    [
        {"id": "y", "text": "Berlin is large", "score": 0.7},
        {"id": "x", "text": "Paris is the capital", "score": 0.3},
        {"text": "  unrelated text\n", "metadata": {"source": "second"}}
    ]
]"#;

#[test]
fn test_fuse_lists_parsed_from_json() -> Result<()> {
    let lists: Vec<RankedList> = serde_json::from_str(LISTS_JSON)?;
    let fused = fuse(&lists, 60.0)?;

    assert_eq!(fused.len(), 3);
    assert_eq!(fused[0].id.as_deref(), Some("x"));
    assert_eq!(fused[1].id.as_deref(), Some("y"));

    // The id-less document appears in both lists with the same trimmed text
    let unrelated = &fused[2];
    assert_eq!(
        unrelated.identity(),
        DocumentIdentity::ContentHash(fusionrag::models::content_hash("unrelated text"))
    );
    let expected = 1.0 / 63.0 + 1.0 / 63.0;
    assert!((unrelated.fusion_score.unwrap() - expected).abs() < 1e-12);
    // First copy has a score, the second has none
    assert_eq!(unrelated.score, Some(0.2));

    let json = serde_json::to_value(&fused)?;
    assert!(json[0]["fusion_score"].as_f64().is_some());
    Ok(())
}

#[test]
fn test_rank_fusion_rejects_invalid_k() {
    assert!(matches!(RankFusion::new(0.0), Err(FusionRagError::InvalidParameter(_))));
    assert!(matches!(
        fuse(&[vec![Document::new("a")]], f64::NAN),
        Err(FusionRagError::InvalidParameter(_))
    ));
}

#[test]
fn test_rank_fusion_top_k_and_scores_descending() -> Result<()> {
    let lists: Vec<RankedList> = (0..4)
        .map(|shift| {
            (0..6)
                .map(|i| Document::new(format!("doc {}", (i + shift) % 6)))
                .collect()
        })
        .collect();

    let fused = RankFusion::new(10.0)?.fuse_top_k(&lists, 4);
    assert_eq!(fused.len(), 4);
    assert!(fused
        .windows(2)
        .all(|w| w[0].fusion_score >= w[1].fusion_score));
    Ok(())
}
