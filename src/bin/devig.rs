use anyhow::{Context, Result, anyhow, bail};

use matchday_edge::devig::{self, DevigMethod};

fn main() -> Result<()> {
    let mut method = DevigMethod::Power;
    let mut odds = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--method" || arg == "-m" {
            let raw = args.next().ok_or_else(|| anyhow!("--method needs a value"))?;
            method = DevigMethod::parse(&raw)
                .ok_or_else(|| anyhow!("unknown method {raw}; use power, shin or multiplicative"))?;
            continue;
        }
        let odd: f64 = arg
            .parse()
            .with_context(|| format!("{arg} is not a decimal odd"))?;
        odds.push(odd);
    }
    if odds.len() < 2 {
        bail!("usage: devig [--method power|shin|multiplicative] <odd> <odd> [odd...]");
    }

    let fair = devig::devig(&odds, method);
    println!(
        "book sum {:.5} (margin {:+.2}%), method {:?}{}",
        fair.booksum,
        (fair.booksum - 1.0) * 100.0,
        fair.method,
        if fair.fallback { " after fallback" } else { "" }
    );
    for (odd, p) in odds.iter().zip(&fair.probs) {
        println!(
            "{odd:>8.2}  raw {:>6.2}%  fair {:>6.2}%  fair odd {:>7.3}",
            100.0 / odd,
            p * 100.0,
            1.0 / p.max(1e-9)
        );
    }
    Ok(())
}
