/// Three-way result shared by the Local-LLM and External-API classifiers
/// (SPEC_FULL.md §4.5 step 6), matching
/// `original_source/escalation/escalation_engine.py`'s
/// `classify_with_local_llm_api`/`classify_with_external_api` return shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierOutcome {
    Bot,
    Human,
    Inconclusive,
}
