use anyhow::{Context, Result};
use clap::Parser;
use mrgtl::db::TranslationDb;
use mrgtl::get_counter;
use mrgtl::types::LayoutConfig;
use mrgtl::utils::counter::WorkResult;
use mrgtl::{args, container, db, readable, rewriter, utils};

fn load_db(path: &str) -> Result<TranslationDb> {
    let data = utils::files::read_file(path).with_context(|| format!("reading {}", path))?;
    let text = String::from_utf8(data).context("database file is not valid UTF-8")?;
    TranslationDb::from_json(&text).with_context(|| format!("parsing database {}", path))
}

fn save_db(db: &TranslationDb, path: &str) -> Result<()> {
    let json = db.as_json()?;
    utils::files::make_sure_dir_exists(path)?;
    let mut f = utils::files::write_file(path)?;
    use std::io::Write;
    f.write_all(json.as_bytes())?;
    Ok(())
}

fn apply_charswap_flag(db: &mut TranslationDb, path: &Option<String>) -> Result<()> {
    if let Some(path) = path {
        let table = utils::charswap::read_csv(path).with_context(|| format!("reading {}", path))?;
        let mut merged = db.get_charswap_map().clone();
        merged.extend(table);
        db.set_charswap_map(merged);
    }
    Ok(())
}

fn run(arg: args::Args) -> Result<()> {
    let layout = LayoutConfig { wrap_width: arg.wrap_width, pua_enabled: !arg.no_pua, strict: arg.strict };

    match arg.command {
        args::Command::Extract { allscr, script_text } => {
            let allscr_bytes = utils::files::read_file(&allscr).with_context(|| format!("reading {}", allscr))?;
            let script_text_bytes =
                utils::files::read_file(&script_text).with_context(|| format!("reading {}", script_text))?;
            let allscr_container = container::Container::parse(&allscr_bytes)?;
            let script_text_container = container::Container::parse(&script_text_bytes)?;
            let db = TranslationDb::from_mrg(&allscr_container, &script_text_container, arg.jobs)?;
            save_db(&db, &arg.db)?;
            for _ in &db.scene_map {
                get_counter().inc(WorkResult::Ok);
            }
            eprintln!("{}", get_counter());
        }
        args::Command::Export { scene, output } => {
            let mut db = load_db(&arg.db)?;
            apply_charswap_flag(&mut db, &arg.charswap_csv)?;
            match scene {
                Some(scene) => {
                    let text = readable::export_text(&db, &scene)?;
                    utils::files::make_sure_dir_exists(&output)?;
                    let mut f = utils::files::write_file(&output)?;
                    use std::io::Write;
                    f.write_all(text.as_bytes())?;
                    get_counter().inc(WorkResult::Ok);
                }
                None => {
                    let scene_names: Vec<String> = db.scene_names(true).into_iter().map(String::from).collect();
                    for scene in scene_names {
                        let subdir = db::export_subdir(&scene);
                        let path = std::path::Path::new(&output).join(subdir).join(format!("{}.txt", scene));
                        let text = match readable::export_text(&db, &scene) {
                            Ok(t) => t,
                            Err(e) => {
                                eprintln!("warning: skipping scene '{}': {}", scene, e);
                                get_counter().inc_warning();
                                continue;
                            }
                        };
                        utils::files::make_sure_dir_exists(&path)?;
                        std::fs::write(&path, text)?;
                        get_counter().inc(WorkResult::Ok);
                    }
                }
            }
            eprintln!("{}", get_counter());
        }
        args::Command::Import { input, legacy, scene } => {
            let mut db = load_db(&arg.db)?;
            let data = utils::files::read_file(&input).with_context(|| format!("reading {}", input))?;
            let text = String::from_utf8(data).context("import file is not valid UTF-8")?;
            if legacy {
                let scene = scene.context("--legacy requires --scene")?;
                readable::import_legacy(&mut db, &scene, &text)?;
                get_counter().inc(WorkResult::Ok);
            } else {
                let imported = readable::import_text(&text)?;
                let conflicts = readable::apply_import(&mut db, imported, arg.strict)?;
                for msg in &conflicts {
                    eprintln!("warning: {}", msg);
                    get_counter().inc_warning();
                }
                get_counter().inc(WorkResult::Ok);
            }
            save_db(&db, &arg.db)?;
            eprintln!("{}", get_counter());
        }
        args::Command::Inject { output } => {
            let mut db = load_db(&arg.db)?;
            apply_charswap_flag(&mut db, &arg.charswap_csv)?;

            let packed = rewriter::generate_script_text_mrg(&db, &layout)?;
            utils::files::make_sure_dir_exists(&output)?;
            std::fs::write(&output, packed)?;
            for _ in db.scene_names(true) {
                get_counter().inc(WorkResult::Ok);
            }
            eprintln!("{}", get_counter());
        }
        args::Command::Lint => {
            let db = load_db(&arg.db)?;
            let pct = db.translated_percent();
            println!("translated: {:.1}%", pct);
            let scene_names: Vec<String> = db.scene_names(true).into_iter().map(String::from).collect();
            for scene in scene_names {
                if let Err(e) = rewriter::render_scene(&db, &scene, &layout) {
                    eprintln!("error: scene '{}': {}", scene, e);
                    get_counter().inc_error();
                } else {
                    get_counter().inc(WorkResult::Ok);
                }
            }
            eprintln!("{}", get_counter());
            if get_counter().has_errors() {
                anyhow::bail!("lint found unrenderable scenes");
            }
        }
    }
    Ok(())
}

fn main() {
    let _ = ctrlc::try_set_handler(|| {
        eprintln!("Aborted.");
        eprintln!("{}", get_counter());
        std::process::exit(1);
    });

    let arg = args::Args::parse();
    if let Err(e) = run(arg) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
    if get_counter().has_errors() {
        std::process::exit(1);
    }
}
