use anyhow::{Context, Result};
use cifar10_ssl as source;
use dotenv::dotenv;
use itertools::Itertools;
use source::{
    data::{
        cifar10::CLASSES,
        reader::{BinaryBatchReader, PickleBatchReader},
        split::{get_dataset_with_reader, SemiSupervisedSplit, SplitConfig},
    },
    utils::{buffer_to_image, get_env, show_image_terminal_color, Stats},
};

fn load(dir: &str, config: &SplitConfig) -> Result<SemiSupervisedSplit> {
    // the binary distribution ships `*.bin` batches, the python one plain pickles
    let split = match get_env("DB_FORMAT").as_deref() {
        Ok("bin") => get_dataset_with_reader(dir, config, &BinaryBatchReader),
        _ => get_dataset_with_reader(dir, config, &PickleBatchReader),
    };
    split.with_context(|| format!("loading dataset from `{dir}`"))
}

fn main() -> Result<()> {
    dotenv().ok();

    let dir = get_env("DB_BASE_DIR")?;
    let n_label = match get_env("N_LABEL") {
        Ok(n) => n.parse().context("parsing `N_LABEL`")?,
        Err(_) => 4000,
    };
    let config = SplitConfig::new(n_label).with_seed(Some(0));

    // load the data
    let split = load(&dir, &config)?;
    println!("labeled: {}", split.labeled.len());
    println!("unlabeled: {}", split.unlabeled.len());
    println!("test: {}", split.test.len());

    let counts = split.labeled.iter().filter_map(|e| e.class()).counts();
    for (class, name) in CLASSES.iter().enumerate() {
        println!(
            "{class} {name:>10}: {} labeled",
            counts.get(&class).copied().unwrap_or_default()
        );
    }

    // sample an image
    let example = split.test.first().context("empty test set")?;
    let class = example.class().context("test example without label")?;
    println!("label: {class} - {}", CLASSES[class]);
    show_image_terminal_color(&example.img);
    std::fs::create_dir_all("./out")?;
    let img = buffer_to_image(&example.img);
    img.save("./out/example-image.png")?;

    // calculate stats
    let stats = Stats::from_iter(
        split
            .labeled
            .iter()
            .map(|e| &e.img)
            .chain(split.unlabeled.iter()),
    );
    println!("{:#?}", stats);

    Ok(())
}
