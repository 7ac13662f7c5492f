use hmmlda::{
    AnnealSchedule, Config, Corpus, CountTable, Error, GibbsSampler, Lexicon, ModelKind, TableKind, Tables,
    BOUNDARY, CONTENT_STATE,
};
use proptest::prelude::*;

/// Count tables rebuilt from scratch out of the current labels.
fn recount(gibbs: &GibbsSampler) -> Tables {
    let snap = gibbs.snapshot();
    let s = snap.state_count;
    let w = snap.vocabulary.len();
    let mut transitions = CountTable::new(TableKind::Transitions, s, s);
    let mut state_word = CountTable::new(TableKind::StateWord, s, w);
    let (mut topic_word, mut document_topic) = match snap.kind {
        ModelKind::Hmm => (None, None),
        ModelKind::HmmLda => (
            Some(CountTable::new(TableKind::TopicWord, snap.topic_count, w)),
            Some(CountTable::new(
                TableKind::DocumentTopic,
                snap.document_count,
                snap.topic_count,
            )),
        ),
    };

    let mut previous = BOUNDARY;
    for token in gibbs.corpus().tokens() {
        let state = snap.state_labels[token.position];
        transitions.increment(previous, state);
        if token.is_eos() {
            previous = BOUNDARY;
            continue;
        }
        match (&mut topic_word, &mut document_topic, &snap.topic_labels) {
            (Some(tw), Some(dt), Some(topics)) if state == CONTENT_STATE => {
                let topic = topics[token.position];
                tw.increment(topic, token.word);
                dt.increment(token.document, topic);
            }
            _ => state_word.increment(state, token.word),
        }
        previous = state;
    }
    Tables {
        transitions,
        state_word,
        topic_word,
        document_topic,
    }
}

fn two_document_corpus() -> (Corpus, Lexicon) {
    let mut lexicon = Lexicon::new();
    let mut builder = Corpus::builder(&mut lexicon);
    builder.document();
    builder.sequence(["the", "cat", "sat"]).unwrap();
    builder.document();
    builder.sequence(["a", "dog", "ran"]).unwrap();
    let corpus = builder.build();
    (corpus, lexicon)
}

fn story_corpus() -> (Corpus, Lexicon) {
    let mut lexicon = Lexicon::new();
    let corpus = Corpus::from_texts(
        &[
            "The cook stirred the soup. The soup was hot. A cook tasted the soup",
            "The ship left the harbour. A sailor climbed the mast. The ship was fast",
            "The cook watched the ship. The sailor ate the soup",
        ],
        &mut lexicon,
    )
    .unwrap();
    (corpus, lexicon)
}

#[test]
fn two_documents_three_states_count_six_emissions() {
    for kind in [ModelKind::Hmm, ModelKind::HmmLda] {
        let (corpus, lexicon) = two_document_corpus();
        assert_eq!(corpus.len(), 8);
        let config = Config::new(kind).states(3).topics(2).iterations(5).seed(3);
        let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
        gibbs.train().unwrap();

        let tables = gibbs.tables();
        assert_eq!(tables.emission_total(), 6);
        // boundary row never collects emissions
        assert_eq!(tables.state_word.row_total(BOUNDARY), 0);
        assert_eq!(tables, recount(&gibbs));
    }
}

#[test]
fn counts_are_exact_after_every_sweep() {
    for kind in [ModelKind::Hmm, ModelKind::HmmLda] {
        let (corpus, lexicon) = story_corpus();
        let words = corpus.word_token_count() as u64;
        let config = Config::new(kind).states(5).topics(3).seed(9);
        let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
        for _ in 0..10 {
            gibbs.sweep(1.0).unwrap();
            let tables = gibbs.tables();
            assert!(tables.is_consistent());
            assert_eq!(tables.emission_total(), words);
            assert_eq!(tables, recount(&gibbs));
        }
    }
}

#[test]
fn annealed_sweeps_keep_counts_exact() {
    let (corpus, lexicon) = story_corpus();
    let config = Config::new(ModelKind::HmmLda).states(4).topics(2).seed(5);
    let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
    gibbs
        .train_with_schedule(6, |it| if it < 3 { 3.0 } else { 0.5 })
        .unwrap();
    assert_eq!(gibbs.tables(), recount(&gibbs));
}

#[test]
fn cold_constant_temperature_trains() {
    for kind in [ModelKind::Hmm, ModelKind::HmmLda] {
        let (corpus, lexicon) = story_corpus();
        let config = Config::new(kind)
            .states(6)
            .topics(3)
            .iterations(5)
            .anneal(AnnealSchedule::Constant { temperature: 0.01 });
        let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
        gibbs.train().unwrap();
        assert_eq!(gibbs.iterations_done(), 5);
        assert_eq!(gibbs.tables(), recount(&gibbs));
    }
}

#[test]
fn retract_then_commit_is_identity_everywhere() {
    let (corpus, lexicon) = story_corpus();
    let config = Config::new(ModelKind::HmmLda).states(4).topics(2).iterations(3);
    let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
    gibbs.train().unwrap();

    for position in 0..gibbs.corpus().len() {
        let token = gibbs.corpus().token(position);
        if token.is_eos() {
            continue;
        }
        let cursor = gibbs.cursor_at(position);
        let before = gibbs.tables();
        let model = gibbs.model_mut();
        let old = model.retract(&token, &cursor).unwrap();
        model.commit(&token, &cursor, old).unwrap();
        assert_eq!(gibbs.tables(), before, "position {position}");
    }
}

#[test]
fn double_retract_reports_negative_count() {
    let (corpus, lexicon) = two_document_corpus();
    let config = Config::new(ModelKind::Hmm).states(3);
    let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
    let token = gibbs.corpus().token(1);
    let cursor = gibbs.cursor_at(1);
    gibbs.model_mut().retract(&token, &cursor).unwrap();
    let err = gibbs.model_mut().retract(&token, &cursor).unwrap_err();
    assert!(matches!(err, Error::NegativeCount { .. }));
}

#[test]
fn same_seed_same_counts() {
    let run = |seed: u64| {
        let (corpus, lexicon) = story_corpus();
        let config = Config::new(ModelKind::HmmLda)
            .states(5)
            .topics(2)
            .iterations(8)
            .seed(seed);
        let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
        gibbs.train().unwrap();
        (gibbs.tables(), gibbs.snapshot().state_labels)
    };
    assert_eq!(run(17), run(17));
}

#[test]
fn empty_documents_do_not_break_topic_terms() {
    let mut lexicon = Lexicon::new();
    let mut builder = Corpus::builder(&mut lexicon);
    builder.document();
    builder.document();
    builder.sequence(["--"]).unwrap();
    builder.sequence(["", "!"]).unwrap();
    builder.document();
    builder.sequence(["rain", "falls"]).unwrap();
    let corpus = builder.build();
    assert_eq!(corpus.document_count(), 3);

    let config = Config::new(ModelKind::HmmLda).states(3).topics(2).iterations(4);
    let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
    gibbs.train().unwrap();
    let tables = gibbs.tables();
    assert_eq!(tables.emission_total(), 2);
    let dt = tables.document_topic.unwrap();
    assert_eq!(dt.row_total(0), 0);
    assert_eq!(dt.row_total(1), 0);
}

fn corpus_from_ids(docs: &[Vec<Vec<u8>>]) -> (Corpus, Lexicon) {
    let mut lexicon = Lexicon::new();
    let mut builder = Corpus::builder(&mut lexicon);
    for doc in docs {
        builder.document();
        for sentence in doc {
            let words: Vec<String> = sentence.iter().map(|w| format!("w{w}")).collect();
            builder.sequence(words.iter().map(String::as_str)).unwrap();
        }
    }
    let corpus = builder.build();
    (corpus, lexicon)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn random_corpora_keep_exact_counts(
        docs in prop::collection::vec(
            prop::collection::vec(prop::collection::vec(0u8..6, 0..6), 1..4),
            1..4,
        ),
        states in 2usize..6,
        topics in 1usize..4,
        lda in any::<bool>(),
        seed in any::<u64>(),
    ) {
        let (corpus, lexicon) = corpus_from_ids(&docs);
        let words = corpus.word_token_count() as u64;
        let kind = if lda { ModelKind::HmmLda } else { ModelKind::Hmm };
        let config = Config::new(kind).states(states).topics(topics).iterations(3).seed(seed);
        let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
        gibbs.train().unwrap();

        let tables = gibbs.tables();
        prop_assert_eq!(tables.emission_total(), words);
        prop_assert_eq!(tables.transitions.total(), gibbs.corpus().len() as u64);
        prop_assert_eq!(&tables, &recount(&gibbs));
        for token in gibbs.corpus().tokens() {
            let state = gibbs.model().assignment(token.position).state;
            prop_assert_eq!(token.is_eos(), state == BOUNDARY);
        }
    }

    #[test]
    fn draws_never_land_on_zero_weight(
        weights in prop::collection::vec(prop_oneof![Just(0.0), 0.01f64..10.0], 1..8),
        u in 0.0f64..1.0,
    ) {
        prop_assume!(weights.iter().any(|&w| w > 0.0));
        let i = hmmlda::categorical_index(&weights, u).unwrap();
        prop_assert!(weights[i] > 0.0);
    }
}
