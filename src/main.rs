use clap::Parser;
use rpforth::runtime::{
    built_ins::register_builtin_words,
    config::Config,
    error,
    interpreter::{rpforth_interpreter::RpforthInterpreter, Interpreter},
    persistence::load_image,
    repl::{EditorReader, Repl},
};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Log to stderr so the console session on stdout stays clean.
fn init_logging(config: &Config) {
    let filter = EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("warn"));

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> error::Result<()> {
    let config = Config::parse();

    init_logging(&config);

    // Create the machine and register every primitive.  These are all the words that are
    // implemented in Rust.
    let mut interpreter = RpforthInterpreter::with_config(config.clone());

    register_builtin_words(&mut interpreter);

    // An image given on the command line replaces the empty program before the first prompt.
    if let Some(image) = &config.image {
        let names = load_image(&mut interpreter, image)?;

        info!("start up image {} loaded", image);
        interpreter.write_line(&format!("  Definitions loaded: {}", names.len()))?;
    }

    let mut reader = EditorReader::new(config.history_path())?;

    Repl::new().run(&mut interpreter, &mut reader)
}
