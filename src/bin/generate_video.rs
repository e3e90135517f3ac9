// One-shot video generation from image files on disk.
//
//   generate-video --subject face1.png --subject face2.jpg --product bag.png \
//       --aspect-ratio 9:16 --background "rooftop cafe at sunset" --output out.mp4

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use veo_studio::form::SUBJECT_SLOT_COUNT;
use veo_studio::intake::{self, ImageSource};
use veo_studio::{
    AspectRatio, Config, FormState, GenerationClient, GenerationError, GenerationParams, PromptLocale,
    ProgressSink, SlotIndex, VeoClient, VideoStore,
};

#[derive(Debug, Parser)]
#[command(name = "generate-video", version, about = "Generate a face/product-preserving video with Veo")]
struct Args {
    /// Subject face image (repeat up to 4 times, different angles help)
    #[arg(long = "subject", required = true)]
    subjects: Vec<PathBuf>,
    /// Optional product image
    #[arg(long)]
    product: Option<PathBuf>,
    #[arg(long, default_value = "16:9")]
    aspect_ratio: AspectRatio,
    #[arg(long, default_value = "")]
    background: String,
    #[arg(long, default_value = "")]
    action: String,
    #[arg(long, default_value = "")]
    speech: String,
    /// Prompt language (vi or en); defaults to VEO_PROMPT_LOCALE
    #[arg(long)]
    locale: Option<PromptLocale>,
    /// Overrides GEMINI_API_KEY
    #[arg(long)]
    api_key: Option<String>,
    #[arg(long, short)]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn,veo_studio=info")),
        )
        .init();

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(locale) = args.locale {
        config.prompt_locale = locale;
    }

    let Some(api_key) = args.api_key.clone().or_else(|| config.api_key.clone()) else {
        eprintln!("❌ No API key. Set GEMINI_API_KEY or pass --api-key (the project must have billing enabled).");
        std::process::exit(2);
    };

    if args.subjects.len() > SUBJECT_SLOT_COUNT {
        eprintln!("❌ At most {} subject images are supported", SUBJECT_SLOT_COUNT);
        std::process::exit(2);
    }

    let form = build_form(&args).await?;
    let params = match GenerationParams::from_form(&form) {
        Ok(params) => params,
        Err(e) => {
            eprintln!("❌ {}", e);
            std::process::exit(2);
        }
    };

    let provider = Arc::new(VeoClient::new(api_key).with_base_url(config.base_url.clone()));
    let client = GenerationClient::new(provider, VideoStore::new(), &config);

    let (sink, mut updates) = ProgressSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(update) = updates.recv().await {
            println!("[{}] {}", update.timestamp.format("%H:%M:%S"), update.message);
        }
    });

    let result = client.generate(&params, &sink).await;
    drop(sink);
    printer.await.ok();

    match result {
        Ok(video) => {
            let bytes = video.bytes().ok_or("generated video was released before it could be saved")?;
            tokio::fs::write(&args.output, bytes.as_slice()).await?;
            println!("✅ Saved {} ({} bytes) to {}", video.content_type(), video.size_bytes(), args.output.display());
            Ok(())
        }
        Err(GenerationError::AuthRequired) => {
            eprintln!("❌ AUTH_REQUIRED: select an API key from a Google Cloud project with billing enabled.");
            eprintln!("   https://ai.google.dev/gemini-api/docs/billing");
            std::process::exit(3);
        }
        Err(e) => {
            eprintln!("❌ Error: {}", e);
            std::process::exit(1);
        }
    }
}

async fn build_form(args: &Args) -> std::io::Result<FormState> {
    let mut form = FormState::new();

    for (slot, path) in SlotIndex::all().zip(&args.subjects) {
        intake::intake(ImageSource::File(path.clone()), |image| form.set_subject(slot, image)).await?;
        if form.subject(slot).is_none() {
            eprintln!("⚠️ Skipping {}: not an image", path.display());
        }
    }

    if let Some(path) = &args.product {
        intake::intake(ImageSource::File(path.clone()), |image| form.set_product(image)).await?;
        if form.product().is_none() {
            eprintln!("⚠️ Skipping product {}: not an image", path.display());
        }
    }

    form.aspect_ratio = args.aspect_ratio;
    form.background_prompt = args.background.clone();
    form.action_prompt = args.action.clone();
    form.speech_prompt = args.speech.clone();
    Ok(form)
}
