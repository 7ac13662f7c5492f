use hmmlda::{Config, Corpus, Error, GibbsSampler, Lexicon, ModelKind, CONTENT_STATE};

fn trained(kind: ModelKind) -> GibbsSampler {
    let mut lexicon = Lexicon::new();
    let corpus = Corpus::from_texts(
        &[
            "The cook stirred the soup. The soup was hot",
            "The ship left the harbour. A sailor climbed the mast",
        ],
        &mut lexicon,
    )
    .unwrap();
    let config = Config::new(kind).states(4).topics(2).iterations(10).seed(3);
    let mut gibbs = GibbsSampler::new(config, corpus, lexicon).unwrap();
    gibbs.train().unwrap();
    gibbs
}

#[test]
fn new_documents_are_counted_on_top_of_training() {
    for kind in [ModelKind::Hmm, ModelKind::HmmLda] {
        let gibbs = trained(kind);
        let base = gibbs.tables();
        let known = gibbs.lexicon().len();

        let mut lexicon = gibbs.lexicon().extended();
        let corpus = Corpus::from_texts(
            &["The sailor stirred the stew", "A cook sang. The ship was hot"],
            &mut lexicon,
        )
        .unwrap();
        // "stew" and "sang" are unseen in training
        assert_eq!(lexicon.len(), known + 2);
        let words = corpus.word_token_count() as u64;
        let tokens = corpus.len() as u64;

        let mut test = gibbs.held_out(corpus, lexicon).unwrap();
        test.train().unwrap();

        let tables = test.tables();
        assert!(tables.is_consistent());
        assert_eq!(tables.emission_total(), base.emission_total() + words);
        assert_eq!(tables.transitions.total(), base.transitions.total() + tokens);
        assert_eq!(tables.state_word.cols(), known + 2);
        for state in 0..base.state_word.rows() {
            for word in 0..known {
                assert!(tables.state_word.get(state, word) >= base.state_word.get(state, word));
            }
        }
        assert_eq!(gibbs.tables(), base);
        assert_eq!(test.report().states.len(), 3);

        if kind == ModelKind::HmmLda {
            let document_topic = tables.document_topic.unwrap();
            assert_eq!(document_topic.rows(), 2);
            let content = test
                .corpus()
                .tokens()
                .filter(|t| test.model().assignment(t.position).state == CONTENT_STATE)
                .count();
            assert_eq!(document_topic.total(), content as u64);
            assert_eq!(tables.topic_word.unwrap().cols(), known + 2);
        }
    }
}

#[test]
fn unrelated_lexicon_is_rejected() {
    let gibbs = trained(ModelKind::HmmLda);
    let mut lexicon = Lexicon::new();
    let corpus = Corpus::from_texts(&["zebras graze"], &mut lexicon).unwrap();
    let err = gibbs.held_out(corpus, lexicon).err().unwrap();
    assert!(matches!(err, Error::SnapshotMismatch(_)));
}
