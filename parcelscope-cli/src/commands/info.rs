use anyhow::Context;

use crate::{app::GlobalOptions, commands::common::require_roots, output::print_output};

fn flag(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn run(name: &str, opts: &GlobalOptions) -> anyhow::Result<()> {
    let loader = require_roots(opts)?;
    let units = loader
        .describe(name)
        .with_context(|| format!("failed to describe {name}"))?;

    print_output(&units, opts, |units| {
        let Some(first) = units.first() else {
            return;
        };
        println!("{} [{}]", first.relative.display(), first.language);
        println!("  {}", first.absolute.display());

        let last = units.len() - 1;
        for (i, unit) in units.iter().enumerate() {
            let (branch, stem) = if i == last {
                ("└──", "    ")
            } else {
                ("├──", "│   ")
            };
            let compiled = if unit.compiled { "compiled" } else { "not compiled" };
            println!("{branch} {} {} ({compiled})", unit.kind, unit.name);
            println!(
                "{stem}fields: {}  methods: {}  constructors: {}",
                unit.fields, unit.methods, unit.constructors
            );
            println!(
                "{stem}parcelable: {}  CREATOR: {}  Parcel constructor: {}",
                flag(unit.parcelable),
                flag(unit.creator),
                flag(unit.parcel_constructor)
            );
        }
    })
}
