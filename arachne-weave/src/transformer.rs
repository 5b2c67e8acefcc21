//! 织入变换
//!
//! 对每个类消费一次：解析方法与通知的匹配关系，产出语义等价的
//! 织入类。变换是包裹而非改写：原始方法体原封不动，通知层记录在
//! 派发表条目上，由执行协议在调用时包裹。因此方法体内部自行捕获
//! 处理的故障绝不会触及 on_throw。
//!
//! 带标记的切点会为匹配方法引入内部包装：外层方法退化为委托，
//! 合成包装名嵌入声明的标记文本，供归因使用。

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use arachne_core::{ClassSpec, MethodBody, MethodSpec, WeaveError, WeaveResult};
use tracing::{debug, trace};

use crate::advice::AdviceBundle;
use crate::mixin::MixinSpec;
use crate::woven::{WeaveOptions, WovenClass, WovenMethod};

/// 一个具体方法与匹配到它的通知集（按声明顺序）
///
/// 每个类在变换时解析一次；顺序对相同输入是稳定且确定的。
#[derive(Debug)]
pub struct MatchedMethod {
    /// 方法名
    pub method: String,

    /// 匹配的通知，第 0 条最外层
    pub bundles: Vec<Arc<AdviceBundle>>,
}

/// 织入变换器
pub struct Transformer;

impl Transformer {
    /// 解析一个类的全部方法匹配
    pub fn resolve(spec: &ClassSpec, advice: &[Arc<AdviceBundle>]) -> Vec<MatchedMethod> {
        spec.methods
            .iter()
            .map(|method| MatchedMethod {
                method: method.name.clone(),
                bundles: advice
                    .iter()
                    .filter(|bundle| {
                        bundle
                            .pointcut
                            .matches(&spec.name, &spec.interfaces, method)
                    })
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    /// 变换一个类
    ///
    /// 失败只影响这个类；调用方继续织入其它类。
    pub fn transform(
        spec: &ClassSpec,
        advice: &[Arc<AdviceBundle>],
        mixins: &[Arc<MixinSpec>],
        options: WeaveOptions,
    ) -> WeaveResult<Arc<WovenClass>> {
        let matched = Self::resolve(spec, advice);
        let mut methods: HashMap<String, Arc<WovenMethod>> = HashMap::new();
        let mut interfaces = spec.interfaces.clone();
        let mut woven_count = 0usize;

        for (method, resolution) in spec.methods.iter().zip(&matched) {
            if !resolution.bundles.is_empty() {
                woven_count += 1;
                trace!(
                    class = %spec.name,
                    method = %method.name,
                    advice = resolution.bundles.len(),
                    "method matched"
                );
            }

            // 分层：无标记的通知附着当前层；带标记的通知各自开一个
            // 更内的包装层并附着其上。最内层持有原始方法体。
            let mut layers: Vec<(String, Vec<Arc<AdviceBundle>>)> =
                vec![(method.name.clone(), Vec::new())];
            for bundle in &resolution.bundles {
                match &bundle.pointcut.marker {
                    Some(marker) => {
                        let wrapper = wrapper_name(&spec.name, method, marker, &bundle.name);
                        layers.push((wrapper, vec![Arc::clone(bundle)]));
                    }
                    None => layers
                        .last_mut()
                        .expect("layers start non-empty")
                        .1
                        .push(Arc::clone(bundle)),
                }
            }

            let last = layers.len() - 1;
            for (idx, (layer_name, layer_advice)) in layers.iter().enumerate() {
                let body: MethodBody = if idx == last {
                    Arc::clone(&method.body)
                } else {
                    delegate_body(layers[idx + 1].0.clone())
                };
                let layer_spec = MethodSpec {
                    name: layer_name.clone(),
                    param_types: method.param_types.clone(),
                    return_type: method.return_type.clone(),
                    is_static: method.is_static,
                    body,
                };
                insert_entry(
                    &mut methods,
                    &spec.name,
                    WovenMethod {
                        spec: layer_spec,
                        advice: layer_advice.clone(),
                        mixin_origin: None,
                    },
                )?;
            }
        }

        // 混入：目标匹配且能力尚未暴露时合入方法集。
        // 能力已经存在时跳过，保证幂等。
        let mut applied: Vec<Arc<MixinSpec>> = Vec::new();
        for mixin in mixins {
            if !mixin.applies_to(&spec.name, &spec.interfaces) {
                continue;
            }
            if interfaces.iter().any(|i| *i == mixin.capability) {
                debug!(
                    class = %spec.name,
                    mixin = %mixin.name,
                    capability = %mixin.capability,
                    "capability already present, skipping mixin"
                );
                continue;
            }
            for method in &mixin.methods {
                insert_entry(
                    &mut methods,
                    &spec.name,
                    WovenMethod {
                        spec: method.clone(),
                        advice: Vec::new(),
                        mixin_origin: Some(mixin.name.clone()),
                    },
                )?;
            }
            interfaces.push(mixin.capability.clone());
            applied.push(Arc::clone(mixin));
        }

        debug!(
            class = %spec.name,
            methods = spec.methods.len(),
            woven = woven_count,
            mixins = applied.len(),
            "class transformed"
        );

        Ok(Arc::new(WovenClass::new(
            spec.name.clone(),
            interfaces,
            methods,
            applied,
            Arc::clone(&spec.state_factory),
            options,
        )))
    }
}

fn insert_entry(
    methods: &mut HashMap<String, Arc<WovenMethod>>,
    class: &str,
    entry: WovenMethod,
) -> WeaveResult<()> {
    let name = entry.spec.name.clone();
    if methods.insert(name.clone(), Arc::new(entry)).is_some() {
        return Err(WeaveError::Transform {
            class: class.to_string(),
            reason: format!("dispatch table collision on '{}'", name),
        });
    }
    Ok(())
}

// 外层委托体：原样把调用转给更内一层
fn delegate_body(next: String) -> MethodBody {
    Arc::new(move |ctx| ctx.call(&next, ctx.args()))
}

/// 合成包装名：`{方法名}$marker${标记文本}${hash8}`
///
/// 标记文本原样作为前缀段嵌入；hash8 是对类名、方法名、参数类型与
/// 通知名做确定性散列后的 8 位十六进制，保证同名重载与多条标记
/// 通知互不冲突。相同输入在同一构建内产生相同名字。
fn wrapper_name(class: &str, method: &MethodSpec, marker: &str, bundle: &str) -> String {
    let mut hasher = DefaultHasher::new();
    class.hash(&mut hasher);
    method.name.hash(&mut hasher);
    method.param_types.hash(&mut hasher);
    bundle.hash(&mut hasher);
    format!(
        "{}$marker${}${:08x}",
        method.name,
        marker,
        hasher.finish() & 0xffff_ffff
    )
}
