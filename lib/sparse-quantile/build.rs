use std::marker::PhantomData;

const I32_MIN_AS_F64: f64 = i32::MIN as f64;
const I32_MAX_AS_F64: f64 = i32::MAX as f64;

struct RawSketchParameters<K> {
    bin_key_type: PhantomData<K>,
    min_value: f64,
    rel_accuracy: f64,
    gamma_v: f64,
    gamma_ln: f64,
    norm_min: f64,
    norm_bias: i32,
}

impl<K> RawSketchParameters<K> {
    fn from_limits(rel_accuracy: f64, min_value: f64) -> Self {
        assert!(
            rel_accuracy > 0.0 && rel_accuracy < 1.0,
            "relative accuracy must be between 0.0 and 1.0"
        );
        assert!(min_value > 0.0, "min value must be greater than 0.0");

        // The gamma parameter is derived from the relative accuracy: gamma = 1 + 2 * rel_accuracy.
        // This relationship comes from the DDSketch paper's logarithmic index mapping.
        let two_rel_accuracy = rel_accuracy * 2.0;
        let gamma_v = 1.0 + two_rel_accuracy;
        let gamma_ln = two_rel_accuracy.ln_1p();

        let raw_norm_eff_min = (min_value.ln() / gamma_ln).floor();
        assert!(
            (I32_MIN_AS_F64..=I32_MAX_AS_F64).contains(&raw_norm_eff_min),
            "norm_eff_min must fit in an i32"
        );

        let norm_eff_min = raw_norm_eff_min as i32;
        let norm_bias = -norm_eff_min + 1;
        let norm_min = gamma_v.powf(f64::from(1 - norm_bias));

        assert!(norm_min <= min_value, "norm min should not exceed min_value");

        Self {
            bin_key_type: PhantomData,
            min_value,
            rel_accuracy,
            gamma_v,
            gamma_ln,
            norm_min,
            norm_bias,
        }
    }

    fn bin_key_type(&self) -> &'static str {
        std::any::type_name::<K>()
    }
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Calculate the index-mapping parameters for the supported key widths and generate the
    // scenario-specific parameter types referenced when creating a `Sketch`.
    let default_params = RawSketchParameters::<u16>::from_limits(1.0 / 100.0, 1.0e-9);
    let generated_default_params = generate_sketch_parameters_impl(
        "DefaultSketchParameters",
        "Sketch parameters balancing resolution and bin-key width for general metrics use.",
        &default_params,
    );

    let high_resolution_params = RawSketchParameters::<u32>::from_limits(1.0 / 1024.0, 1.0e-9);
    let generated_high_resolution_params = generate_sketch_parameters_impl(
        "HighResolutionSketchParameters",
        "Sketch parameters trading wider bin keys for a much tighter relative error bound.",
        &high_resolution_params,
    );

    // Concatenate the generated sketch parameters code and write it out.
    let mut contents = Vec::new();
    contents.extend(generated_default_params.as_bytes());
    contents.extend(generated_high_resolution_params.as_bytes());

    let config_file = std::env::var("OUT_DIR").unwrap() + "/params.rs";
    std::fs::write(config_file, contents).expect("failed to write params file");
}

fn generate_sketch_parameters_impl<K>(
    params_type_name: &str, params_type_desc: &str, params: &RawSketchParameters<K>,
) -> String {
    format!(
        r#"
        /// {}
        #[derive(Clone, Copy, Debug, Eq, PartialEq)]
        pub struct {};

        impl crate::SketchParameters for {} {{
            type BinKey = {};

            const MINIMUM_VALUE: f64 = {};
            const RELATIVE_ACCURACY: f64 = {};
            const GAMMA_V: f64 = {};
            const GAMMA_LN: f64 = {};
            const NORM_MIN: f64 = {};
            const NORM_BIAS: i32 = {};
        }}

		"#,
        params_type_desc,
        params_type_name,
        params_type_name,
        params.bin_key_type(),
        params.min_value,
        params.rel_accuracy,
        params.gamma_v,
        params.gamma_ln,
        params.norm_min,
        params.norm_bias
    )
}
