#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Instant;

    use crate::{
        catalog::{Catalog, Pattern, Selection},
        generate,
        normalize,
        oracle::compare_all,
        GeneratedModule,
        NormalizedLine,
        Oracle,
    };

    /// Directive mnemonics that frame a module but never reach the decoded image
    const FRAME: [&str; 8] = ["ideal", "segment", "assume", "org", "p286", "p286n", "ends", "end"];

    // Helper function to compose the whole catalog once per test
    fn generate_everything() -> Vec<GeneratedModule> {
        let start = Instant::now();
        let modules = match generate(&Selection::all()) {
            Ok(modules) => modules,
            Err(e) => panic!("Generation failed: {}", e),
        };
        println!("Generated {} modules in {:?}", modules.len(), start.elapsed());
        modules
    }

    fn body_only(module: &GeneratedModule) -> Vec<NormalizedLine> {
        normalize::listing(&module.source)
            .into_iter()
            .filter(|line| !FRAME.contains(&line.mnemonic()))
            .collect()
    }

    #[test]
    fn test_whole_catalog_composes() {
        let catalog = Catalog::standard().expect("standard catalog must build");
        println!("Catalog holds {} forms", catalog.len());

        let modules = generate_everything();
        assert!(modules.len() > catalog.len() / 2, "Too few modules for {} forms", catalog.len());

        let instructions: usize = modules.iter().map(|module| module.instructions).sum();
        println!("Total instructions: {}", instructions);
        assert!(instructions > modules.len());

        for module in &modules {
            assert!(module.instructions > 0, "{} is empty", module.name);
            assert!(module.source.ends_with("END start\n"), "{} is not terminated", module.name);
        }
    }

    #[test]
    fn test_module_names_are_unique_and_short() {
        let modules = generate_everything();

        let mut seen = HashSet::new();
        for module in &modules {
            assert!(module.name.len() <= 8, "{} does not fit a DOS file name", module.name);
            assert!(seen.insert(module.name.clone()), "Duplicate module name {}", module.name);
        }
        println!("{} unique names", seen.len());
    }

    #[test]
    fn test_every_module_matches_itself() {
        let modules = generate_everything();

        let items: Vec<_> = modules
            .iter()
            .map(|module| {
                let listing = normalize::listing(&module.source);
                (module.name.clone(), listing.clone(), listing)
            })
            .collect();

        let start = Instant::now();
        let verdicts = compare_all(&items, true);
        println!("Compared {} modules in {:?}", verdicts.len(), start.elapsed());

        for verdict in &verdicts {
            assert!(verdict.result.is_match(), "{}: {:?}", verdict.module, verdict.result);
        }
    }

    #[test]
    fn test_body_only_decoded_listing_matches() {
        // A disassembler emits no assembler directives, only the code
        let oracle = Oracle::default();
        let modules = generate_everything();

        for module in &modules {
            let original = normalize::listing(&module.source);
            let decoded = body_only(module);
            let result = oracle.compare_lines(&original, &decoded);
            assert!(result.is_match(), "{}: {:?}", module.name, result);
        }
    }

    #[test]
    fn test_renamed_conditional_jumps_match() {
        let modules = generate(&Selection::pattern(Pattern::Exact("JC".to_string()))).unwrap();
        assert!(!modules.is_empty());

        let oracle = Oracle::default();
        for module in &modules {
            let decoded: Vec<NormalizedLine> = body_only(module)
                .iter()
                .map(|line| if line.mnemonic() == "jc" { line.with_mnemonic("jb") } else { line.clone() })
                .collect();
            assert!(decoded.iter().any(|line| line.mnemonic() == "jb"));

            let result = oracle.compare_lines(&normalize::listing(&module.source), &decoded);
            assert!(result.is_match(), "{}: {:?}", module.name, result);
        }
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let modules = generate_everything();

        // Break every other module so both verdicts are represented
        let items: Vec<_> = modules
            .iter()
            .enumerate()
            .map(|(i, module)| {
                let original = normalize::listing(&module.source);
                let mut decoded = body_only(module);
                if i % 2 == 1 {
                    decoded.pop();
                }
                (module.name.clone(), original, decoded)
            })
            .collect();

        let start = Instant::now();
        let sequential = compare_all(&items, false);
        println!("Sequential: {:?}", start.elapsed());

        let start = Instant::now();
        let parallel = compare_all(&items, true);
        println!("Parallel: {:?}", start.elapsed());

        assert_eq!(sequential, parallel);
        let failed = parallel.iter().filter(|verdict| !verdict.result.is_match()).count();
        assert_eq!(failed, modules.len() / 2);
    }
}
