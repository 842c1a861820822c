//! JavaScript snippets run by the chrome backend.
//!
//! Functions taking no arguments are called with the target element bound to
//! `this` (`Runtime.callFunctionOn`). String inputs are embedded as JSON
//! literals so selectors and attribute names need no manual escaping.

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

pub fn query_document(selector: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll({}))",
        js_string(selector)
    )
}

pub fn query_frame(selector: &str) -> String {
    format!(
        r#"function(){{const doc=this.contentDocument;if(!doc)throw new Error('frame document unavailable');return Array.from(doc.querySelectorAll({}))}}"#,
        js_string(selector)
    )
}

pub const IS_INTERACTABLE: &str = r#"function(){if(!this.isConnected)return false;const style=getComputedStyle(this);const rect=this.getBoundingClientRect();return style.display!=='none'&&style.visibility!=='hidden'&&parseFloat(style.opacity||'1')>0&&rect.width>0&&rect.height>0&&!this.disabled}"#;

pub const IS_FRAME: &str =
    r#"function(){return(this.tagName==='IFRAME'||this.tagName==='FRAME')&&!!this.contentDocument}"#;

pub const SCROLL_INTO_VIEW: &str = r#"function(){this.scrollIntoView({block:'center',inline:'center',behavior:'instant'});return true}"#;

/// Resolves the click point in top-level viewport coordinates and reports
/// whether another element sits on top of it.
pub const CLICK_POINT: &str = r#"function(){if(!this.isConnected)return{state:'detached'};const r=this.getBoundingClientRect();if(r.width===0||r.height===0)return{state:'hidden'};let x=r.left+r.width/2,y=r.top+r.height/2;const hit=this.ownerDocument.elementFromPoint(x,y);const clear=!!hit&&(hit===this||this.contains(hit)||hit.contains(this));let w=this.ownerDocument.defaultView;while(w&&w.frameElement){const f=w.frameElement.getBoundingClientRect();x+=f.left;y+=f.top;w=w.parent}return{state:clear?'ok':'covered',x,y}}"#;

pub const INNER_TEXT: &str =
    r#"function(){return this.innerText??this.textContent??''}"#;

pub const FOCUS: &str = r#"function(){this.focus();return true}"#;

pub const CLEAR: &str = r#"function(){this.focus();if(this.isContentEditable){const doc=this.ownerDocument;const range=doc.createRange();range.selectNodeContents(this);const sel=doc.getSelection();sel.removeAllRanges();sel.addRange(range);doc.execCommand('delete')}else if('value' in this){this.value='';this.dispatchEvent(new Event('input',{bubbles:true}));this.dispatchEvent(new Event('change',{bubbles:true}))}return true}"#;

pub fn get_attribute(name: &str) -> String {
    format!(
        "function(){{return this.getAttribute({})}}",
        js_string(name)
    )
}
