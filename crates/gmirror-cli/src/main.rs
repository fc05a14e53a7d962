use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use colored::*;
use gmirror_core::{config::Config, utils, DriveClient, Mirror, MirrorEvent, UploadMode, UploadOutcome};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gmirror")]
#[command(author, version, about = "ローカルディレクトリを Google Drive に複製するツール", long_about = None)]
struct Cli {
    /// サービスアカウント鍵ファイル（設定ファイル・環境変数より優先）
    #[arg(long, global = true, value_name = "PATH")]
    credentials: Option<PathBuf>,

    /// デバッグログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ディレクトリツリーを Drive に複製
    ///
    /// サブフォルダはルートからの相対パスを名前として親フォルダ直下に作成される。
    /// 実行のたびに新しいフォルダが作成される点に注意。
    Mirror {
        /// 複製するローカルディレクトリ
        path: PathBuf,

        /// アップロード先フォルダ ID（デフォルト: 設定値）
        #[arg(short, long)]
        parent: Option<String>,

        /// 同名ファイルがあれば上書きする
        #[arg(short, long)]
        update: bool,
    },

    /// ファイルを 1 つアップロード
    Upload {
        /// アップロードするファイル
        file: PathBuf,

        /// Drive 上のファイル名（デフォルト: ローカルのファイル名）
        #[arg(short, long)]
        name: Option<String>,

        /// アップロード先フォルダ ID（デフォルト: 設定値）
        #[arg(short, long)]
        parent: Option<String>,

        /// 同名ファイルがあれば上書きする
        #[arg(short, long)]
        update: bool,
    },

    /// フォルダを作成（同名フォルダがあっても新規作成）
    Mkdir {
        /// フォルダ名
        name: String,

        /// 親フォルダ ID（デフォルト: 設定値）
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// フォルダ直下のファイルを名前で検索
    Find {
        /// ファイル名
        name: String,

        /// 検索するフォルダ ID（デフォルト: 設定値）
        #[arg(short, long)]
        parent: Option<String>,
    },

    /// 設定の表示・変更
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// シェル補完スクリプトを出力
    Completions {
        /// 対象シェル
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// 現在の設定を表示
    Show,

    /// サービスアカウント鍵ファイルのパスを設定
    SetCredentials {
        /// 鍵ファイルのパス
        path: PathBuf,
    },

    /// デフォルトのアップロード先フォルダ ID を設定
    SetRoot {
        /// フォルダ ID
        id: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::load()?;

    match cli.command {
        Commands::Mirror {
            path,
            parent,
            update,
        } => {
            let client = connect(cli.credentials.as_deref(), &config)?;
            let parent = parent.unwrap_or_else(|| config.root_folder_id());
            mirror(&client, &path, &parent, update)?
        }
        Commands::Upload {
            file,
            name,
            parent,
            update,
        } => {
            let client = connect(cli.credentials.as_deref(), &config)?;
            let parent = parent.unwrap_or_else(|| config.root_folder_id());
            upload(&client, &file, name, &parent, update)?
        }
        Commands::Mkdir { name, parent } => {
            let client = connect(cli.credentials.as_deref(), &config)?;
            let parent = parent.unwrap_or_else(|| config.root_folder_id());
            Mirror::new(&client)
                .with_reporter(print_event)
                .ensure_remote_folder(&name, &parent)?;
        }
        Commands::Find { name, parent } => {
            let client = connect(cli.credentials.as_deref(), &config)?;
            let parent = parent.unwrap_or_else(|| config.root_folder_id());
            find(&client, &name, &parent)?
        }
        Commands::Config { action } => configure(config, action)?,
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "gmirror", &mut io::stdout());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "gmirror_core=debug" } else { "warn" };

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)))
        .init();
}

/// 鍵ファイルで認証してクライアントを作成
fn connect(credentials: Option<&Path>, config: &Config) -> Result<DriveClient> {
    let path = credentials
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.credentials_path());
    debug!("Using credentials file {}", path.display());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
    spinner.set_message("Google Drive に接続中...");
    spinner.enable_steady_tick(std::time::Duration::from_millis(100));

    let client = gmirror_core::authenticate(&path);
    spinner.finish_and_clear();

    let client = client.with_context(|| format!("認証に失敗しました ({})", path.display()))?;

    println!(
        "{} {} として認証しました",
        "🔑".cyan(),
        client.client_email().bright_blue()
    );

    Ok(client)
}

/// 進捗を 1 行表示
fn print_event(event: &MirrorEvent) {
    match event {
        MirrorEvent::FolderCreated { name, id } => println!(
            "  {} フォルダ '{}' を作成しました (ID: {})",
            "📁".cyan(),
            name.bright_blue(),
            id.dimmed()
        ),
        MirrorEvent::FileUploaded { name, id, size } => println!(
            "  {} {} をアップロードしました [{}] (ID: {})",
            "⬆".green(),
            name.bright_blue(),
            utils::format_size(*size).yellow(),
            id.dimmed()
        ),
        MirrorEvent::FileUpdated { name, id, size } => println!(
            "  {} {} を更新しました [{}] (ID: {})",
            "🔄".yellow(),
            name.bright_blue(),
            utils::format_size(*size).yellow(),
            id.dimmed()
        ),
    }
}

#[derive(Default)]
struct Summary {
    folders: usize,
    uploaded: usize,
    updated: usize,
    bytes: u64,
}

impl Summary {
    fn record(&mut self, event: &MirrorEvent) {
        match event {
            MirrorEvent::FolderCreated { .. } => self.folders += 1,
            MirrorEvent::FileUploaded { size, .. } => {
                self.uploaded += 1;
                self.bytes += size;
            }
            MirrorEvent::FileUpdated { size, .. } => {
                self.updated += 1;
                self.bytes += size;
            }
        }
    }
}

fn mirror(client: &DriveClient, path: &Path, parent: &str, update: bool) -> Result<()> {
    println!(
        "{} {} を {} に複製中...\n",
        "☁".cyan().bold(),
        path.display().to_string().bright_blue(),
        parent.yellow()
    );

    let mode = if update {
        UploadMode::Update
    } else {
        UploadMode::Create
    };

    let mut summary = Summary::default();
    let folders = Mirror::new(client)
        .with_mode(mode)
        .with_reporter(|event| {
            summary.record(event);
            print_event(event);
        })
        .mirror_tree(path, parent)?;

    println!(
        "\n{} フォルダ {} 件作成、ファイル {} 件アップロード、{} 件更新しました ({})",
        "✅".green(),
        summary.folders.to_string().green().bold(),
        summary.uploaded.to_string().green().bold(),
        summary.updated.to_string().green().bold(),
        utils::format_size(summary.bytes).green().bold()
    );
    debug!("{} local folders mapped", folders.len());

    if mode == UploadMode::Create {
        println!(
            "{} {}",
            "💡".cyan(),
            "同名のフォルダ・ファイルがあっても新規作成されます。上書きするには --update (-u) を指定してください"
                .dimmed()
        );
    }

    Ok(())
}

fn upload(
    client: &DriveClient,
    file: &Path,
    name: Option<String>,
    parent: &str,
    update: bool,
) -> Result<()> {
    let name = match name {
        Some(name) => name,
        None => utils::remote_file_name(file)
            .with_context(|| format!("ファイル名を取得できません: {}", file.display()))?,
    };

    let mut uploader = Mirror::new(client).with_reporter(print_event);

    if update {
        match uploader.upload_or_update_file(file, &name, parent)? {
            UploadOutcome::Created(_) => debug!("No existing '{}' in {}", name, parent),
            UploadOutcome::Updated(id) => debug!("Overwrote {}", id),
        }
    } else {
        uploader.upload_file(file, &name, parent)?;
    }

    Ok(())
}

fn find(client: &DriveClient, name: &str, parent: &str) -> Result<()> {
    match Mirror::new(client).find_file(name, parent)? {
        Some(id) => println!("{} {} (ID: {})", "✓".green(), name.bright_blue(), id),
        None => println!(
            "{} {} は {} に見つかりませんでした",
            "✗".yellow(),
            name.bright_blue(),
            parent.dimmed()
        ),
    }

    Ok(())
}

fn configure(mut config: Config, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{} {}", "設定ファイル:".bold(), Config::config_path()?.display());
            println!(
                "  credentials_path = {}",
                config.credentials_path().display().to_string().bright_blue()
            );
            println!("  root_folder_id   = {}", config.root_folder_id().bright_blue());
        }
        ConfigAction::SetCredentials { path } => {
            config.credentials_path = Some(path);
            config.save()?;
            println!("{} 鍵ファイルのパスを保存しました", "✅".green());
        }
        ConfigAction::SetRoot { id } => {
            config.root_folder_id = Some(id);
            config.save()?;
            println!("{} デフォルトのフォルダ ID を保存しました", "✅".green());
        }
    }

    Ok(())
}
