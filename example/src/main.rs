use std::process::ExitCode;

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::*;
use env_logger::Env;

use hmmlda::{AnnealSchedule, Column, Config, Corpus, GibbsSampler, Lexicon, ModelKind};

//
// A toy corpus: two topics (the kitchen and the harbour) wrapped in the
// same function words, so states should separate them from the topics.
//
const DOCUMENTS: &[&str] = &[
    "The cook stirred the soup in the pot. A baker kneaded the dough on the table. The oven was hot and the bread was warm.",
    "She chopped the onions with a knife. The soup simmered on the stove while the cook tasted the sauce.",
    "The baker sliced the bread and the cook served the soup. A pot of tea was on the table.",
    "The ship sailed out of the harbour at dawn. A sailor tied the rope to the mast and the wind filled the sail.",
    "The captain steered the boat past the lighthouse. The waves were high and the crew pulled the nets.",
    "A fisherman mended the nets on the dock. The boat was tied to the pier and the tide was low.",
];

const HELD_OUT: &str = "The sailor ate the bread on the boat. The cook mended the nets.";

fn column_table(title: &str, columns: &[Column]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new(title).fg(Color::Red),
            Cell::new("P").fg(Color::Red),
            Cell::new("Words").fg(Color::White),
        ]);
    for c in columns {
        let words = c
            .words
            .iter()
            .map(|(w, p)| format!("{w}[{p:.3}]"))
            .collect::<Vec<_>>()
            .join(" ");
        table.add_row(vec![
            Cell::new(&c.label),
            Cell::new(format!("{:.4}", c.probability)),
            Cell::new(words),
        ]);
    }
    table
}

fn run() -> hmmlda::Result<()> {
    let mut lexicon = Lexicon::new();
    let corpus = Corpus::from_texts(DOCUMENTS, &mut lexicon)?;
    let config = Config::new(ModelKind::HmmLda)
        .states(5)
        .topics(2)
        .iterations(400)
        .top_n(6)
        .anneal(AnnealSchedule::Stepped {
            initial: 2.0,
            target: 1.0,
            decrement: 0.25,
        });

    let mut gibbs = GibbsSampler::from_config(config, corpus, lexicon)?;
    println!(
        "Training HMM-LDA (S={}, K={}, iters={})...",
        gibbs.config().states,
        gibbs.config().topics,
        gibbs.config().iterations
    );
    gibbs.train()?;
    log::info!("\n{}", gibbs.snapshot().describe());

    let report = gibbs.report();
    print!("{}", report.to_tabulated_string());
    println!("{}", column_table("State", &report.states));
    println!("{}", column_table("Topic", &report.topics));

    let mut unseen = gibbs.lexicon().extended();
    let held_out = Corpus::from_texts(&[HELD_OUT], &mut unseen)?;
    let mut tagger = gibbs.held_out(held_out, unseen)?;
    tagger.train()?;
    let tagged = tagger
        .corpus()
        .tokens()
        .filter(|t| !t.is_eos())
        .map(|t| {
            let word = tagger.lexicon().token_of(t.word).unwrap_or("?");
            format!("{word}/{}", tagger.model().assignment(t.position).state)
        })
        .collect::<Vec<_>>()
        .join(" ");
    println!("Held-out: {tagged}");
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
